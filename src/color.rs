//! Per-class display colors.

use std::collections::{HashMap, HashSet};
use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{AnnotateError, Result};

/// Random samples tried before falling back to a deterministic scan.
pub const MAX_COLOR_ATTEMPTS: usize = 64;

const COLOR_SPACE: u32 = 1 << 24;

/// Step between fallback start points, coprime with the color space size.
const FALLBACK_STRIDE: u32 = 0x9E_3779;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    fn from_u32(value: u32) -> Self {
        Self {
            r: (value >> 16) as u8,
            g: (value >> 8) as u8,
            b: value as u8,
        }
    }

    pub fn to_egui(&self) -> egui::Color32 {
        egui::Color32::from_rgb(self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.r, self.g, self.b)
    }
}

/// Maps class names to pairwise distinct colors. A color, once handed out,
/// never changes for the lifetime of the registry.
pub struct ColorRegistry {
    colors: HashMap<String, Rgb>,
    used: HashSet<Rgb>,
    rng: StdRng,
}

impl Default for ColorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorRegistry {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Registry with a reproducible color sequence.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            colors: HashMap::new(),
            used: HashSet::new(),
            rng,
        }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Look up a color without assigning one.
    pub fn get(&self, class_name: &str) -> Option<Rgb> {
        self.colors.get(class_name).copied()
    }

    /// Color for `class_name`, generating and caching a new one on first use.
    pub fn color_for(&mut self, class_name: &str) -> Result<Rgb> {
        if let Some(color) = self.get(class_name) {
            return Ok(color);
        }

        let rng = &mut self.rng;
        let color = pick_unused(&self.used, || Rgb::from_u32(rng.gen_range(0..COLOR_SPACE)))
            .ok_or(AnnotateError::ColorSpaceExhausted {
                classes: self.colors.len(),
            })?;

        self.used.insert(color);
        self.colors.insert(class_name.to_string(), color);
        log::debug!("Assigned {} to class '{}'", color, class_name);
        Ok(color)
    }

    /// Make sure every name in `class_names` has a color, in order.
    pub fn assign_all<'a>(&mut self, class_names: impl IntoIterator<Item = &'a str>) -> Result<()> {
        for name in class_names {
            self.color_for(name)?;
        }
        Ok(())
    }
}

/// Draw from `sample` until it yields a color not in `used`. After
/// [`MAX_COLOR_ATTEMPTS`] collisions, scan the RGB cube from a start derived
/// from `used.len()` and return the first free value. `None` only when all
/// 2^24 colors are taken.
fn pick_unused(used: &HashSet<Rgb>, mut sample: impl FnMut() -> Rgb) -> Option<Rgb> {
    for _ in 0..MAX_COLOR_ATTEMPTS {
        let color = sample();
        if !used.contains(&color) {
            return Some(color);
        }
    }

    log::warn!(
        "No free color after {} random samples, falling back to scan",
        MAX_COLOR_ATTEMPTS
    );
    let start = (used.len() as u32).wrapping_mul(FALLBACK_STRIDE) % COLOR_SPACE;
    (0..COLOR_SPACE)
        .map(|i| Rgb::from_u32((start + i) % COLOR_SPACE))
        .find(|color| !used.contains(color))
}
