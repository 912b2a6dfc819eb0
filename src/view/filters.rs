//! Client-side display filters expressed as Picsum query parameters.

use crate::photos::PhotoRecord;

const GRAYSCALE_MARKER: &str = "grayscale";
const BLUR_MARKER: &str = "blur";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayFilters {
    pub grayscale: bool,
    pub blur: bool,
}

impl DisplayFilters {
    pub fn toggle_grayscale(&mut self) {
        self.grayscale = !self.grayscale;
    }

    pub fn toggle_blur(&mut self) {
        self.blur = !self.blur;
    }

    /// `base` with the active filter markers appended. Grayscale always
    /// precedes blur.
    pub fn display_url(&self, base: &str) -> String {
        match (self.grayscale, self.blur) {
            (false, false) => base.to_string(),
            (true, false) => format!("{}?{}", base, GRAYSCALE_MARKER),
            (false, true) => format!("{}?{}", base, BLUR_MARKER),
            (true, true) => format!("{}?{}&{}", base, GRAYSCALE_MARKER, BLUR_MARKER),
        }
    }

    /// Copy of `record` with the filters baked into `download_url` and the
    /// matching flags set. `record` itself is left untouched.
    pub fn bake(&self, record: &PhotoRecord) -> PhotoRecord {
        PhotoRecord {
            download_url: self.display_url(&record.download_url),
            is_blurry: self.blur,
            is_black_and_white: self.grayscale,
            ..record.clone()
        }
    }

    /// Undo [`bake`](Self::bake) for a previously saved record: the filters
    /// it was saved with, and a copy whose `download_url` has no query.
    pub fn restore(record: &PhotoRecord) -> (Self, PhotoRecord) {
        let filters = Self {
            grayscale: record.is_black_and_white,
            blur: record.is_blurry,
        };
        let base = match record.download_url.split_once('?') {
            Some((base, _)) => base.to_string(),
            None => record.download_url.clone(),
        };
        let unbaked = PhotoRecord {
            download_url: base,
            is_blurry: false,
            is_black_and_white: false,
            ..record.clone()
        };
        (filters, unbaked)
    }

    pub fn describe(&self) -> String {
        let on_off = |b: bool| if b { "on" } else { "off" };
        format!(
            "grayscale {}, blur {}",
            on_off(self.grayscale),
            on_off(self.blur)
        )
    }
}
