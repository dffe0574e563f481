//! Noise filter: drop header/footer boilerplate and decorative images.
//!
//! Without a layout model, position bands plus literal noise substrings are
//! the cheapest reliable proxy for "boilerplate vs. content". Each predicate
//! is a named stage returning a [`Verdict`]; stages run left to right and
//! the first definitive verdict wins. A candidate nobody objects to is kept.
//!
//! All thresholds come from [`Heuristics`].

use crate::config::Heuristics;

/// Outcome of one filter stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    /// Drop, with the name of the rule that fired.
    Drop(&'static str),
    NoOpinion,
}

/// A text block under consideration.
#[derive(Debug, Clone, Copy)]
pub struct TextCandidate<'a> {
    /// Trimmed block text.
    pub text: &'a str,
    pub y0: f32,
    pub page_height: f32,
}

/// An embedded image under consideration.
#[derive(Debug, Clone, Copy)]
pub struct ImageCandidate {
    pub y0: f32,
    pub page_height: f32,
    /// Characters of page text inside the image's box, after trimming.
    pub overlay_chars: usize,
}

type TextStage = fn(&TextCandidate<'_>, &Heuristics) -> Verdict;
type ImageStage = fn(&ImageCandidate, &Heuristics) -> Verdict;

pub const TEXT_STAGES: &[TextStage] = &[band_noise, short_noise];
pub const IMAGE_STAGES: &[ImageStage] = &[text_layer, image_band];

fn in_band(y0: f32, page_height: f32, band: f32) -> bool {
    y0 < band || y0 > page_height - band
}

fn is_noise(text: &str, h: &Heuristics) -> bool {
    h.noise_patterns.iter().any(|p| text.contains(p.as_str()))
}

/// Header/footer band text containing a noise substring.
pub fn band_noise(c: &TextCandidate<'_>, h: &Heuristics) -> Verdict {
    if in_band(c.y0, c.page_height, h.text_band) && is_noise(c.text, h) {
        Verdict::Drop("band_noise")
    } else {
        Verdict::NoOpinion
    }
}

/// Short text anywhere on the page containing a noise substring.
pub fn short_noise(c: &TextCandidate<'_>, h: &Heuristics) -> Verdict {
    if c.text.chars().count() < h.short_block_chars && is_noise(c.text, h) {
        Verdict::Drop("short_noise")
    } else {
        Verdict::NoOpinion
    }
}

/// Image covered by a substantial text layer.
pub fn text_layer(c: &ImageCandidate, h: &Heuristics) -> Verdict {
    if c.overlay_chars > h.image_text_limit {
        Verdict::Drop("text_layer")
    } else {
        Verdict::NoOpinion
    }
}

/// Image starting in the header or footer band.
pub fn image_band(c: &ImageCandidate, h: &Heuristics) -> Verdict {
    if in_band(c.y0, c.page_height, h.image_band) {
        Verdict::Drop("image_band")
    } else {
        Verdict::NoOpinion
    }
}

/// Final verdict for a text block.
pub fn filter_text(c: &TextCandidate<'_>, h: &Heuristics) -> Verdict {
    TEXT_STAGES
        .iter()
        .map(|stage| stage(c, h))
        .find(|v| *v != Verdict::NoOpinion)
        .unwrap_or(Verdict::Keep)
}

/// Final verdict for an image.
pub fn filter_image(c: &ImageCandidate, h: &Heuristics) -> Verdict {
    IMAGE_STAGES
        .iter()
        .map(|stage| stage(c, h))
        .find(|v| *v != Verdict::NoOpinion)
        .unwrap_or(Verdict::Keep)
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: f32 = 842.0;

    fn text_of_len(prefix: &str, len: usize) -> String {
        let mut s = prefix.to_string();
        while s.chars().count() < len {
            s.push('x');
        }
        s
    }

    fn cand(text: &str, y0: f32) -> TextCandidate<'_> {
        TextCandidate {
            text,
            y0,
            page_height: H,
        }
    }

    #[test]
    fn short_footer_noise_is_dropped() {
        let t = text_of_len("Modifications reserved ", 40);
        assert_eq!(
            filter_text(&cand(&t, H - 30.0), &Heuristics::default()),
            Verdict::Drop("band_noise")
        );
    }

    #[test]
    fn long_header_noise_is_dropped() {
        let t = text_of_len("Modifications reserved ", 200);
        assert_eq!(
            filter_text(&cand(&t, 20.0), &Heuristics::default()),
            Verdict::Drop("band_noise")
        );
    }

    #[test]
    fn long_body_noise_is_kept() {
        let t = text_of_len("Modifications reserved ", 200);
        assert_eq!(
            filter_text(&cand(&t, 400.0), &Heuristics::default()),
            Verdict::Keep
        );
    }

    #[test]
    fn short_body_noise_is_dropped() {
        assert_eq!(
            filter_text(&cand("[TBD]", 400.0), &Heuristics::default()),
            Verdict::Drop("short_noise")
        );
    }

    #[test]
    fn band_text_without_noise_is_kept() {
        assert_eq!(
            filter_text(&cand("Chapter overview", 10.0), &Heuristics::default()),
            Verdict::Keep
        );
    }

    #[test]
    fn custom_patterns_replace_defaults() {
        let h = Heuristics {
            noise_patterns: vec!["ACME".into()],
            ..Heuristics::default()
        };
        assert_eq!(filter_text(&cand("[TBD]", 400.0), &h), Verdict::Keep);
        assert_eq!(
            filter_text(&cand("ACME confidential", 400.0), &h),
            Verdict::Drop("short_noise")
        );
    }

    fn img(y0: f32, overlay_chars: usize) -> ImageCandidate {
        ImageCandidate {
            y0,
            page_height: H,
            overlay_chars,
        }
    }

    #[test]
    fn image_with_heavy_text_layer_is_dropped() {
        assert_eq!(
            filter_image(&img(300.0, 51), &Heuristics::default()),
            Verdict::Drop("text_layer")
        );
    }

    #[test]
    fn image_with_labels_is_kept() {
        assert_eq!(filter_image(&img(300.0, 50), &Heuristics::default()), Verdict::Keep);
    }

    #[test]
    fn image_in_bands_is_dropped() {
        let h = Heuristics::default();
        assert_eq!(filter_image(&img(79.0, 0), &h), Verdict::Drop("image_band"));
        assert_eq!(filter_image(&img(H - 79.0, 0), &h), Verdict::Drop("image_band"));
        assert_eq!(filter_image(&img(80.0, 0), &h), Verdict::Keep);
    }
}
