use std::ops::Range;

use crate::png::dispatcher::{AnimationControl, BlendOp, DisposeOp, FrameControl};
use crate::utils::error::{ApngError, ApngResult};
use crate::utils::image::{FrameDelay, ImageFrame, PixelData};

/// Fails when a frame rectangle is empty or leaves the canvas
pub fn check_bounds(control: &FrameControl, width: u32, height: u32) -> ApngResult<()> {
    if control.width == 0 || control.height == 0 {
        return Err(ApngError::Composition(format!(
            "frame {} has an empty {}x{} rectangle",
            control.sequence_number, control.width, control.height
        )));
    }

    let right = control.x_offset as u64 + control.width as u64;
    let bottom = control.y_offset as u64 + control.height as u64;

    if right > width as u64 || bottom > height as u64 {
        return Err(ApngError::Composition(format!(
            "frame {} rectangle {}x{}+{}+{} exceeds {}x{} canvas",
            control.sequence_number,
            control.width,
            control.height,
            control.x_offset,
            control.y_offset,
            width,
            height
        )));
    }

    Ok(())
}

/// Straight-alpha "over" of one RGBA pixel onto another
fn blend_over(dst: &mut [u8], src: &[u8]) {
    let src_a = src[3] as u32;

    match src_a {
        255 => dst.copy_from_slice(src),
        0 => {}
        _ => {
            let dst_weight = dst[3] as u32 * (255 - src_a);
            let src_weight = src_a * 255;
            let total = src_weight + dst_weight;

            for i in 0..3 {
                let blended = src[i] as u32 * src_weight + dst[i] as u32 * dst_weight;
                dst[i] = ((blended + total / 2) / total) as u8;
            }
            dst[3] = ((total + 127) / 255) as u8;
        }
    }
}

/// Persistent RGBA8 canvas that APNG frames are drawn onto.
#[derive(Debug)]
pub struct AnimationComposer {
    width: u32,
    height: u32,
    canvas: Vec<u8>,
    // Pre-blend copy of the rectangle of a frame that disposes to Previous
    scratch: Vec<u8>,
}

impl AnimationComposer {
    pub fn new(width: u32, height: u32) -> Self {
        AnimationComposer {
            width,
            height,
            canvas: vec![0; width as usize * height as usize * 4],
            scratch: Vec::new(),
        }
    }

    fn rect_rows(&self, control: &FrameControl) -> impl Iterator<Item = Range<usize>> {
        let stride = self.width as usize * 4;
        let x = control.x_offset as usize * 4;
        let row_len = control.width as usize * 4;
        let y = control.y_offset as usize;

        (y..y + control.height as usize).map(move |row| {
            let start = row * stride + x;
            start..start + row_len
        })
    }

    /// Draws one frame, returns the visible canvas and prepares the canvas
    /// for the next frame according to the frame's dispose op.
    pub fn compose(&mut self, control: &FrameControl, pixels: PixelData) -> ApngResult<ImageFrame> {
        check_bounds(control, self.width, self.height)?;

        let source = pixels.into_rgba8().into_bytes();
        let row_len = control.width as usize * 4;

        if source.len() != row_len * control.height as usize {
            return Err(ApngError::Composition(format!(
                "frame {} has {} bytes of pixels for a {}x{} rectangle",
                control.sequence_number,
                source.len(),
                control.width,
                control.height
            )));
        }

        let rows: Vec<Range<usize>> = self.rect_rows(control).collect();

        if control.dispose_op == DisposeOp::Previous {
            self.scratch.clear();
            for range in &rows {
                self.scratch.extend_from_slice(&self.canvas[range.clone()]);
            }
        }

        for (range, src_row) in rows.iter().zip(source.chunks_exact(row_len)) {
            let dst_row = &mut self.canvas[range.clone()];

            match control.blend_op {
                BlendOp::Source => dst_row.copy_from_slice(src_row),
                BlendOp::Over => {
                    for (dst, src) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
                        blend_over(dst, src);
                    }
                }
            }
        }

        let frame = ImageFrame::new(
            self.width,
            self.height,
            PixelData::RGBA8(self.canvas.clone()),
            Some(FrameDelay::new(control.delay_num, control.delay_den)),
        );

        match control.dispose_op {
            DisposeOp::None => {}
            DisposeOp::Background => {
                for range in rows {
                    self.canvas[range].fill(0);
                }
            }
            DisposeOp::Previous => {
                for (range, saved) in rows.into_iter().zip(self.scratch.chunks_exact(row_len)) {
                    self.canvas[range].copy_from_slice(saved);
                }
            }
        }

        Ok(frame)
    }
}

/// Composites decoded frame rectangles, in sequence order, into full canvas frames.
pub fn compose_animation(
    width: u32,
    height: u32,
    animation: &AnimationControl,
    frames: Vec<(FrameControl, PixelData)>,
) -> ApngResult<Vec<ImageFrame>> {
    if animation.num_frames == 0 {
        return Err(ApngError::Composition("acTL declares zero frames".into()));
    }

    if frames.len() != animation.num_frames as usize {
        return Err(ApngError::Composition(format!(
            "acTL declares {} frames, stream holds {}",
            animation.num_frames,
            frames.len()
        )));
    }

    let mut composer = AnimationComposer::new(width, height);

    frames
        .into_iter()
        .map(|(control, pixels)| composer.compose(&control, pixels))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ErrorKind;

    fn control(width: u32, height: u32, x: u32, y: u32, dispose_op: DisposeOp, blend_op: BlendOp) -> FrameControl {
        FrameControl {
            sequence_number: 0,
            width,
            height,
            x_offset: x,
            y_offset: y,
            delay_num: 1,
            delay_den: 0,
            dispose_op,
            blend_op,
        }
    }

    fn three_frames(dispose_op: DisposeOp) -> ApngResult<Vec<ImageFrame>> {
        let frames = vec![
            (
                control(2, 1, 0, 0, DisposeOp::None, BlendOp::Source),
                PixelData::RGBA8(vec![0; 8]),
            ),
            (
                control(2, 1, 0, 0, dispose_op, BlendOp::Over),
                PixelData::RGBA8(vec![0, 255, 0, 255, 0, 255, 0, 255]),
            ),
            (
                control(2, 1, 0, 0, DisposeOp::None, BlendOp::Over),
                PixelData::RGBA8(vec![0, 0, 255, 128, 0, 0, 0, 0]),
            ),
        ];

        compose_animation(2, 1, &AnimationControl { num_frames: 3, num_plays: 0 }, frames)
    }

    #[test]
    fn background_dispose_clears_the_rectangle() -> ApngResult<()> {
        let frames = three_frames(DisposeOp::Background)?;

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1].as_rgba8(), vec![0, 255, 0, 255, 0, 255, 0, 255]);
        assert_eq!(frames[2].as_rgba8(), vec![0, 0, 255, 128, 0, 0, 0, 0]);

        Ok(())
    }

    #[test]
    fn none_dispose_keeps_previous_content_under_the_next_frame() -> ApngResult<()> {
        let frames = three_frames(DisposeOp::None)?;

        assert_eq!(frames[2].as_rgba8(), vec![0, 127, 128, 255, 0, 255, 0, 255]);

        Ok(())
    }

    #[test]
    fn previous_dispose_restores_pre_blend_content() -> ApngResult<()> {
        let red = vec![255, 0, 0, 255];
        let frames = vec![
            (control(1, 1, 0, 0, DisposeOp::None, BlendOp::Source), PixelData::RGBA8(red.clone())),
            (
                control(1, 1, 0, 0, DisposeOp::Previous, BlendOp::Source),
                PixelData::RGB8(vec![0, 255, 0]),
            ),
            (control(1, 1, 0, 0, DisposeOp::None, BlendOp::Over), PixelData::RGBA8(vec![0; 4])),
        ];

        let frames = compose_animation(1, 1, &AnimationControl { num_frames: 3, num_plays: 1 }, frames)?;

        assert_eq!(frames[1].as_rgba8(), vec![0, 255, 0, 255]);
        assert_eq!(frames[2].as_rgba8(), red);

        Ok(())
    }

    #[test]
    fn previous_dispose_on_first_frame_restores_transparency() -> ApngResult<()> {
        let mut composer = AnimationComposer::new(2, 2);
        let frame = composer.compose(
            &control(1, 1, 1, 1, DisposeOp::Previous, BlendOp::Source),
            PixelData::L8(vec![200]),
        )?;

        assert_eq!(&frame.as_rgba8()[12..], &[200, 200, 200, 255]);
        assert!(composer.canvas.iter().all(|&b| b == 0));

        Ok(())
    }

    #[test]
    fn frames_carry_delay_and_full_canvas() -> ApngResult<()> {
        let mut composer = AnimationComposer::new(3, 2);
        let frame = composer.compose(
            &control(1, 1, 2, 1, DisposeOp::None, BlendOp::Source),
            PixelData::RGBA8(vec![1, 2, 3, 4]),
        )?;

        assert_eq!(frame.width(), 3);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.delay().map(|d| d.as_millis()), Some(10));
        assert_eq!(frame.as_rgba8()[20..], [1, 2, 3, 4]);

        Ok(())
    }

    #[test]
    fn rectangles_must_fit_the_canvas() {
        let mut composer = AnimationComposer::new(4, 4);

        let err = composer
            .compose(&control(2, 2, 3, 0, DisposeOp::None, BlendOp::Source), PixelData::L8(vec![0; 4]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Composition);

        let err = composer
            .compose(&control(0, 2, 0, 0, DisposeOp::None, BlendOp::Source), PixelData::L8(vec![]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Composition);

        assert!(check_bounds(&control(1, 1, u32::MAX, 0, DisposeOp::None, BlendOp::Source), 4, 4).is_err());
    }

    #[test]
    fn frame_count_must_match_declaration() {
        let frames = vec![(control(1, 1, 0, 0, DisposeOp::None, BlendOp::Source), PixelData::L8(vec![0]))];

        let err = compose_animation(1, 1, &AnimationControl { num_frames: 2, num_plays: 0 }, frames.clone())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Composition);

        let err = compose_animation(1, 1, &AnimationControl { num_frames: 0, num_plays: 0 }, frames).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Composition);
    }

    #[test]
    fn over_blend_edges() {
        let mut dst = [10, 20, 30, 255];
        blend_over(&mut dst, &[1, 2, 3, 0]);
        assert_eq!(dst, [10, 20, 30, 255]);

        blend_over(&mut dst, &[1, 2, 3, 255]);
        assert_eq!(dst, [1, 2, 3, 255]);

        let mut dst = [0, 0, 0, 0];
        blend_over(&mut dst, &[200, 100, 50, 64]);
        assert_eq!(dst, [200, 100, 50, 64]);
    }

    #[test]
    fn over_blend_translucent_onto_translucent() {
        let mut dst = [255, 0, 0, 128];
        blend_over(&mut dst, &[0, 0, 255, 128]);
        assert_eq!(dst, [85, 0, 170, 192]);

        let mut dst = [0, 0, 255, 128];
        blend_over(&mut dst, &[255, 0, 0, 128]);
        assert_eq!(dst, [170, 0, 85, 192]);
    }
}
