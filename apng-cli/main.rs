use apng::{DecodeOptions, Image, PixelData, PngDecoder};
use clap::Parser;
use glob::glob;
use log::LevelFilter;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use writer::{FrameFormat, Writer, WriterImage, WriterImageFrame, WriterPixelData};

#[derive(Parser, Debug)]
#[clap(name = "apng")]
struct Cli {
    #[arg(required = true)]
    path: String,

    #[arg(short, long, value_parser = ["png", "pam", "ppm"], help = "Output format")]
    format: Option<String>,

    #[arg(short = 'o', long = "output-dir", help = "Output directory for converted files")]
    output_dir: Option<String>,

    #[arg(long, help = "Print stream metadata as JSON")]
    info: bool,

    #[arg(long, help = "Decode the image without writing to a file")]
    void: bool,

    #[arg(long, help = "Treat every CRC mismatch as fatal")]
    strict: bool,

    #[arg(long = "skip-crc", help = "Do not verify chunk CRCs")]
    skip_crc: bool,

    #[arg(short, long, help = "Log debug output")]
    verbose: bool,
}

impl Cli {
    fn decode_options(&self) -> DecodeOptions {
        DecodeOptions::default()
            .set_strict_crc(self.strict)
            .set_confirm_crc(!self.skip_crc)
    }

    fn frame_format(&self) -> FrameFormat {
        match self.format.as_deref() {
            Some("pam") => FrameFormat::Pam,
            Some("ppm") => FrameFormat::Ppm,
            _ => FrameFormat::Png,
        }
    }
}

fn get_files(path: &str) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut files = Vec::new();
    let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let absolute_pattern = if Path::new(path).is_relative() {
        base_dir.join(path).to_string_lossy().into_owned()
    } else {
        path.to_string()
    };

    for entry in glob(&absolute_pattern)? {
        match entry {
            Ok(path) => {
                if !path.is_file() {
                    continue;
                }

                files.push(path);
            }
            Err(e) => log::warn!("{}", e),
        }
    }

    Ok(files)
}

fn get_output_path(file: &Path, output_dir: Option<&str>, extension: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let file_stem = file
        .file_stem()
        .ok_or("Invalid file name")?
        .to_str()
        .ok_or("Invalid file stem")?;

    let output_path = if let Some(dir) = output_dir {
        let output_dir = Path::new(dir);

        if !output_dir.exists() {
            fs::create_dir_all(output_dir)?;
        }

        let output_dir = if output_dir.is_relative() {
            std::env::current_dir()?.join(output_dir)
        } else {
            output_dir.to_path_buf()
        };

        output_dir.join(format!("{}.{}", file_stem, extension))
    } else {
        // Next to the input, with a suffix so a PNG never overwrites its source
        file.parent()
            .unwrap_or_else(|| Path::new("."))
            .join(format!("{}_decoded.{}", file_stem, extension))
    };

    Ok(output_path)
}

fn to_writer_pixels(pixels: PixelData) -> WriterPixelData {
    match pixels {
        PixelData::L8(data) => WriterPixelData::L8(data),
        PixelData::LA8(data) => WriterPixelData::LA8(data),
        PixelData::RGB8(data) => WriterPixelData::RGB8(data),
        PixelData::RGBA8(data) => WriterPixelData::RGBA8(data),
    }
}

fn image_to_writer_image(image: Image) -> WriterImage {
    let width = image.width();
    let height = image.height();

    let frames = image
        .into_frames()
        .into_iter()
        .map(|frame| WriterImageFrame {
            width: frame.width,
            height: frame.height,
            delay: frame.delay.map(|delay| delay.as_millis()).unwrap_or(0),
            pixels: to_writer_pixels(frame.pixels),
        })
        .collect();

    WriterImage { width, height, frames }
}

fn process_file(file: &Path, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    println!("File: {}", file.display());

    let reader = BufReader::new(File::open(file)?);
    let mut decoder = PngDecoder::with_options(reader, cli.decode_options());

    if cli.void {
        decoder.decode()?;
        return Ok(());
    }

    if cli.info {
        let result = decoder.decode();

        if let Some(info) = decoder.get_info() {
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        result?;
        return Ok(());
    }

    let image = decoder.decode()?;

    if image.is_animated() {
        println!(
            "{} frames, {}",
            image.frames().len(),
            match image.num_plays() {
                Some(0) | None => "loops forever".to_string(),
                Some(plays) => format!("{} plays", plays),
            }
        );
    }

    let format = cli.frame_format();
    let output_path = get_output_path(file, cli.output_dir.as_deref(), format.extension())?;

    if let Some(parent) = output_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let writer_image = image_to_writer_image(image);
    for path in Writer::write_frames(&output_path, &writer_image, format)? {
        println!("Writing to: {}", path.display());
    }

    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(if cli.verbose { LevelFilter::Debug } else { LevelFilter::Warn })
        .parse_default_env()
        .init();

    let files = get_files(&cli.path)?;

    if files.is_empty() {
        eprintln!("No files found matching pattern: {}", cli.path);
        return Ok(());
    }

    for file in files {
        if let Err(err) = process_file(&file, &cli) {
            eprintln!("Error processing file: {}", err);
            continue;
        }
    }

    Ok(())
}
