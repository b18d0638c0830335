//! Contents.json data model for an Xcode `AppIcon.appiconset`
//!
//! Only the subset of Apple's asset catalog schema needed for a single-size
//! app icon is modelled here: one 1024x1024 universal entry that Xcode scales
//! down to every device size on its own.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Author recorded in the `info` block of generated catalogs.
pub const AUTHOR: &str = "glass-icon";

/// Edge length Xcode expects for a single-size app icon.
pub const APP_ICON_SIZE: u32 = 1024;

/// Root structure of a Contents.json file
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ContentsFile {
    /// Array of image entries for the icon set
    pub images: Vec<ImageEntry>,

    /// Versioning and authorship information
    pub info: Info,
}

/// Individual image entry within an asset catalog
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ImageEntry {
    /// The filename of the PNG inside the icon set
    pub filename: String,

    /// The device type for the image ("universal" for single-size icons)
    pub idiom: String,

    /// The target platform (e.g., "ios")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    /// The size of the image in points (e.g., "1024x1024")
    pub size: String,
}

/// Versioning and authorship information for the asset catalog
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Info {
    /// The format version of the asset catalog (always 1)
    pub version: u8,

    /// The application or tool that authored the asset catalog
    pub author: String,
}

impl ContentsFile {
    /// Creates a new Contents.json structure with the specified author
    ///
    /// # Arguments
    /// * `author` - The author recorded in the info block
    pub fn new(author: String) -> Self {
        Self {
            images: Vec::new(),
            info: Info { version: 1, author },
        }
    }

    /// Adds an image entry to the contents file
    pub fn add_image(&mut self, image: ImageEntry) {
        self.images.push(image);
    }

    /// Serialize and write the file as `Contents.json` inside `dir`
    pub fn write_to_dir(&self, dir: &Path) -> Result<()> {
        let contents_json =
            serde_json::to_string_pretty(self).context("Failed to serialize Contents.json")?;
        std::fs::write(dir.join("Contents.json"), contents_json)
            .context("Failed to write Contents.json file")?;
        Ok(())
    }
}

impl ImageEntry {
    /// Creates the single universal iOS app icon entry
    ///
    /// The size is always [`APP_ICON_SIZE`]; the PNG must match it.
    ///
    /// # Arguments
    /// * `filename` - The PNG filename inside the icon set
    pub fn universal_app_icon(filename: String) -> Self {
        Self {
            filename,
            idiom: "universal".to_string(),
            platform: Some("ios".to_string()),
            size: format!("{APP_ICON_SIZE}x{APP_ICON_SIZE}"),
        }
    }
}
