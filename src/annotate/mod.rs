//! Frame annotation: detection boxes, class labels and the frame counter.

mod glyphs;

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::detect::{Detection, HazardClass};

const LABEL_TEXT: Rgb<u8> = Rgb([255, 255, 255]);
const COUNTER_TEXT: Rgb<u8> = Rgb([255, 255, 255]);
const COUNTER_BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);
const UNMAPPED_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const LABEL_PADDING: u32 = 3;
const COUNTER_ORIGIN: (i32, i32) = (10, 10);

/// Fixed overlay colour per hazard class.
pub fn class_color(class: HazardClass) -> Rgb<u8> {
    match class {
        HazardClass::OilLeak => Rgb([255, 0, 0]),
        HazardClass::GasLeak => Rgb([255, 255, 0]),
        HazardClass::Fire => Rgb([255, 69, 0]),
        HazardClass::Smoke => Rgb([128, 128, 128]),
        HazardClass::ChemicalSpill => Rgb([255, 0, 255]),
        HazardClass::SafetyEquipment => Rgb([0, 255, 0]),
        HazardClass::Worker => Rgb([0, 255, 255]),
        HazardClass::Vehicle => Rgb([0, 0, 255]),
        HazardClass::PipeDamage => Rgb([255, 165, 0]),
        HazardClass::Corrosion => Rgb([165, 42, 42]),
        HazardClass::Unknown(_) => UNMAPPED_COLOR,
    }
}

/// `<hazard_class>: <confidence to 2 decimals>`
pub fn detection_label(detection: &Detection) -> String {
    format!("{}: {:.2}", detection.hazard_class(), detection.confidence())
}

/// `Frame: i/total`
pub fn frame_counter_label(frame_number: u64, total_frames: u64) -> String {
    format!("Frame: {}/{}", frame_number, total_frames)
}

#[derive(Clone, Debug)]
pub struct Annotator {
    /// Glyph scale factor for overlay text.
    pub text_scale: u32,
    /// Box outline thickness in pixels.
    pub box_thickness: u32,
}

impl Default for Annotator {
    fn default() -> Self {
        Self {
            text_scale: 2,
            box_thickness: 2,
        }
    }
}

impl Annotator {
    pub fn draw_detections(&self, image: &mut RgbImage, detections: &[Detection]) {
        for detection in detections {
            self.draw_detection(image, detection);
        }
    }

    fn draw_detection(&self, image: &mut RgbImage, detection: &Detection) {
        let color = class_color(detection.hazard_class());
        let bbox = detection.bounding_box();
        let (x1, y1) = (bbox.x1 as i32, bbox.y1 as i32);
        let (w, h) = (bbox.width() as u32, bbox.height() as u32);

        for inset in 0..self.box_thickness {
            let (iw, ih) = (w.saturating_sub(2 * inset), h.saturating_sub(2 * inset));
            if iw == 0 || ih == 0 {
                break;
            }
            let rect = Rect::at(x1 + inset as i32, y1 + inset as i32).of_size(iw, ih);
            draw_hollow_rect_mut(image, rect, color);
        }

        let label = detection_label(detection);
        let (text_w, text_h) = glyphs::text_size(&label, self.text_scale);
        let (bg_w, bg_h) = (text_w + 2 * LABEL_PADDING, text_h + 2 * LABEL_PADDING);
        // Above the box when there is room, otherwise just inside its top edge.
        let bg_y = if y1 >= bg_h as i32 { y1 - bg_h as i32 } else { y1 };
        draw_filled_rect_mut(image, Rect::at(x1, bg_y).of_size(bg_w, bg_h), color);
        glyphs::draw_text(
            image,
            x1 + LABEL_PADDING as i32,
            bg_y + LABEL_PADDING as i32,
            self.text_scale,
            LABEL_TEXT,
            &label,
        );
    }

    /// Overlay applied to every frame, analyzed or not.
    pub fn draw_frame_counter(&self, image: &mut RgbImage, frame_number: u64, total_frames: u64) {
        let label = frame_counter_label(frame_number, total_frames);
        let (text_w, text_h) = glyphs::text_size(&label, self.text_scale);
        let (x, y) = COUNTER_ORIGIN;
        draw_filled_rect_mut(
            image,
            Rect::at(x - LABEL_PADDING as i32, y - LABEL_PADDING as i32)
                .of_size(text_w + 2 * LABEL_PADDING, text_h + 2 * LABEL_PADDING),
            COUNTER_BACKGROUND,
        );
        glyphs::draw_text(image, x, y, self.text_scale, COUNTER_TEXT, &label);
    }
}
