//! # Preset Resolution Module
//!
//! Questo modulo traduce il nome di qualità richiesto dall'utente in un
//! piano di invocazione concreto per Ghostscript.
//!
//! ## Responsabilità:
//! - Risolve il nome del preset (case-insensitive) nel profilo Ghostscript
//! - Fallback silenzioso al preset di default per nomi assenti o sconosciuti
//! - Sceglie una delle due ricette di invocazione in base al profilo
//! - Costruisce la lista di argomenti esatta per la ricetta scelta
//!
//! ## Preset supportati:
//! - `recommended` / `ebook` → `/ebook` (150 DPI, default)
//! - `strong` / `screen` → `/screen` (72 DPI, massima compressione)
//! - `printer` → `/printer` (300 DPI)
//! - `prepress` → `/prepress` (300+ DPI)
//!
//! ## Ricette:
//! - **Conservative**: solo compressione/subsetting dei font, nessun resampling.
//!   Usata da tutti i profili tranne `/screen`.
//! - **Aggressive**: downsampling bicubico a 72 DPI di immagini colore/grigio/mono,
//!   ricodifica JPEG a qualità 60, rilevamento immagini duplicate e rimozione
//!   dei metadati EPS/OPI/halftone. Solo per `/screen`.
//!
//! ## Esempio:
//! ```rust,ignore
//! let resolver = PresetResolver::new(&config);
//! let preset = resolver.resolve(Some("strong"));
//! let recipe = Recipe::build(preset, &input_path, output_path);
//! ```

use crate::args;
use crate::config::Config;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Target resolution for the aggressive recipe's image downsampling
pub const AGGRESSIVE_IMAGE_RESOLUTION: u32 = 72;
/// JPEG quality factor for the aggressive recipe
pub const AGGRESSIVE_JPEG_QUALITY: u8 = 60;
/// PDF compatibility level pinned by both recipes
pub const COMPATIBILITY_LEVEL: &str = "1.4";

/// Ghostscript `-dPDFSETTINGS` profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Profile {
    #[serde(rename = "/screen", alias = "screen")]
    Screen,
    #[serde(rename = "/ebook", alias = "ebook")]
    Ebook,
    #[serde(rename = "/printer", alias = "printer")]
    Printer,
    #[serde(rename = "/prepress", alias = "prepress")]
    Prepress,
    #[serde(rename = "/default", alias = "default")]
    Default,
}

impl Profile {
    pub fn as_setting(&self) -> &'static str {
        match self {
            Self::Screen => "/screen",
            Self::Ebook => "/ebook",
            Self::Printer => "/printer",
            Self::Prepress => "/prepress",
            Self::Default => "/default",
        }
    }

    /// Only `/screen` takes the aggressive path
    pub fn recipe_kind(&self) -> RecipeKind {
        match self {
            Self::Screen => RecipeKind::Aggressive,
            Self::Ebook | Self::Printer | Self::Prepress | Self::Default => RecipeKind::Conservative,
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_setting())
    }
}

/// Which of the two invocation recipes to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipeKind {
    Conservative,
    Aggressive,
}

/// Outcome of preset resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPreset {
    /// The preset name actually used (the default one on fallback)
    pub name: String,
    pub profile: Profile,
    pub kind: RecipeKind,
    /// True when the requested name was missing or unknown
    pub fell_back: bool,
}

/// Maps user-facing quality names to Ghostscript profiles
#[derive(Debug, Clone)]
pub struct PresetResolver {
    presets: BTreeMap<String, Profile>,
    default_preset: String,
}

impl PresetResolver {
    pub fn new(config: &Config) -> Self {
        Self {
            presets: config
                .presets
                .iter()
                .map(|(name, profile)| (name.to_lowercase(), *profile))
                .collect(),
            default_preset: config.default_preset.to_lowercase(),
        }
    }

    /// Resolve a requested preset. Never fails: unknown names use the default.
    pub fn resolve(&self, requested: Option<&str>) -> ResolvedPreset {
        let requested = requested
            .map(|name| name.trim().to_lowercase())
            .filter(|name| !name.is_empty());

        if let Some(name) = requested {
            if let Some(profile) = self.presets.get(&name) {
                return ResolvedPreset {
                    name,
                    profile: *profile,
                    kind: profile.recipe_kind(),
                    fell_back: false,
                };
            }
        }

        // Config::validate guarantees the default exists; `/ebook` covers unvalidated configs
        let profile = self
            .presets
            .get(&self.default_preset)
            .copied()
            .unwrap_or(Profile::Ebook);

        ResolvedPreset {
            name: self.default_preset.clone(),
            profile,
            kind: profile.recipe_kind(),
            fell_back: true,
        }
    }

    pub fn known_presets(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }
}

/// Concrete, immutable invocation plan for one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    pub preset: ResolvedPreset,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub arguments: Vec<String>,
}

impl Recipe {
    pub fn build(preset: ResolvedPreset, input_path: &Path, output_path: PathBuf) -> Self {
        let mut arguments = args![
            "-sDEVICE=pdfwrite",
            format!("-dPDFSETTINGS={}", preset.profile.as_setting()),
            "-dNOPAUSE",
            "-dQUIET",
            "-dBATCH",
            "-dSAFER",
            format!("-dCompatibilityLevel={}", COMPATIBILITY_LEVEL),
        ];

        match preset.kind {
            RecipeKind::Conservative => {
                arguments.extend(args!["-dCompressFonts=true", "-dSubsetFonts=true"]);
            }
            RecipeKind::Aggressive => {
                for channel in ["Color", "Gray", "Mono"] {
                    arguments.extend(args![
                        format!("-dDownsample{}Images=true", channel),
                        format!("-d{}ImageResolution={}", channel, AGGRESSIVE_IMAGE_RESOLUTION),
                        format!("-d{}ImageDownsampleType=/Bicubic", channel),
                    ]);
                }
                arguments.extend(args![
                    "-dEncodeColorImages=true",
                    "-dColorImageFilter=/DCTEncode",
                    format!("-dJPEGQ={}", AGGRESSIVE_JPEG_QUALITY),
                    "-dCompressFonts=true",
                    "-dSubsetFonts=true",
                    "-dDetectDuplicateImages=true",
                    "-dPreserveEPSInfo=false",
                    "-dPreserveOPIComments=false",
                    "-dPreserveHalftoneInfo=false",
                ]);
            }
        }

        arguments.push(format!("-sOutputFile={}", output_path.display()));
        arguments.push(input_path.display().to_string());

        Self {
            preset,
            input_path: input_path.to_path_buf(),
            output_path,
            arguments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> PresetResolver {
        PresetResolver::new(&Config::default())
    }

    #[test]
    fn test_recognized_presets_resolve_deterministically() {
        let resolver = resolver();
        let expected = [
            ("recommended", Profile::Ebook, RecipeKind::Conservative),
            ("ebook", Profile::Ebook, RecipeKind::Conservative),
            ("strong", Profile::Screen, RecipeKind::Aggressive),
            ("screen", Profile::Screen, RecipeKind::Aggressive),
            ("printer", Profile::Printer, RecipeKind::Conservative),
            ("prepress", Profile::Prepress, RecipeKind::Conservative),
        ];

        for (name, profile, kind) in expected {
            let first = resolver.resolve(Some(name));
            let second = resolver.resolve(Some(name));
            assert_eq!(first, second);
            assert_eq!(first.profile, profile, "profile for {}", name);
            assert_eq!(first.kind, kind, "recipe for {}", name);
            assert!(!first.fell_back);
        }
    }

    #[test]
    fn test_unknown_or_absent_falls_back_to_default() {
        let resolver = resolver();
        for requested in [None, Some(""), Some("   "), Some("ultra"), Some("/screen")] {
            let preset = resolver.resolve(requested);
            assert_eq!(preset.name, "recommended");
            assert_eq!(preset.profile, Profile::Ebook);
            assert_eq!(preset.kind, RecipeKind::Conservative);
            assert!(preset.fell_back);
        }
    }

    #[test]
    fn test_fallback_follows_configured_default() {
        let config = Config {
            default_preset: "strong".to_string(),
            ..Default::default()
        };
        let preset = PresetResolver::new(&config).resolve(Some("nope"));
        assert_eq!(preset.profile, Profile::Screen);
        assert_eq!(preset.kind, RecipeKind::Aggressive);
    }

    #[test]
    fn test_names_are_case_insensitive() {
        let preset = resolver().resolve(Some(" Strong "));
        assert_eq!(preset.name, "strong");
        assert_eq!(preset.kind, RecipeKind::Aggressive);
    }

    #[test]
    fn test_conservative_arguments() {
        let preset = resolver().resolve(Some("printer"));
        let recipe = Recipe::build(preset, Path::new("in/a.pdf"), PathBuf::from("out/b.pdf"));
        assert_eq!(
            recipe.arguments,
            vec![
                "-sDEVICE=pdfwrite",
                "-dPDFSETTINGS=/printer",
                "-dNOPAUSE",
                "-dQUIET",
                "-dBATCH",
                "-dSAFER",
                "-dCompatibilityLevel=1.4",
                "-dCompressFonts=true",
                "-dSubsetFonts=true",
                "-sOutputFile=out/b.pdf",
                "in/a.pdf",
            ]
        );
    }

    #[test]
    fn test_aggressive_arguments() {
        let preset = resolver().resolve(Some("strong"));
        let recipe = Recipe::build(preset, Path::new("in/a.pdf"), PathBuf::from("out/b.pdf"));
        assert_eq!(
            recipe.arguments,
            vec![
                "-sDEVICE=pdfwrite",
                "-dPDFSETTINGS=/screen",
                "-dNOPAUSE",
                "-dQUIET",
                "-dBATCH",
                "-dSAFER",
                "-dCompatibilityLevel=1.4",
                "-dDownsampleColorImages=true",
                "-dColorImageResolution=72",
                "-dColorImageDownsampleType=/Bicubic",
                "-dDownsampleGrayImages=true",
                "-dGrayImageResolution=72",
                "-dGrayImageDownsampleType=/Bicubic",
                "-dDownsampleMonoImages=true",
                "-dMonoImageResolution=72",
                "-dMonoImageDownsampleType=/Bicubic",
                "-dEncodeColorImages=true",
                "-dColorImageFilter=/DCTEncode",
                "-dJPEGQ=60",
                "-dCompressFonts=true",
                "-dSubsetFonts=true",
                "-dDetectDuplicateImages=true",
                "-dPreserveEPSInfo=false",
                "-dPreserveOPIComments=false",
                "-dPreserveHalftoneInfo=false",
                "-sOutputFile=out/b.pdf",
                "in/a.pdf",
            ]
        );
    }

    #[test]
    fn test_profile_serde_accepts_both_spellings() {
        let slash: Profile = serde_json::from_str("\"/prepress\"").unwrap();
        let bare: Profile = serde_json::from_str("\"prepress\"").unwrap();
        assert_eq!(slash, Profile::Prepress);
        assert_eq!(bare, Profile::Prepress);
        assert_eq!(serde_json::to_string(&Profile::Screen).unwrap(), "\"/screen\"");
    }
}
