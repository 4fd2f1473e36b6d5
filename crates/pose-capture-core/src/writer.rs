use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Error;
use crate::frame::Frame;
use crate::landmarks::{Detection, LandmarkSchema};
use crate::overlay;
use crate::session::WriteRequest;

/// Which rendering of the frame is saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageVariant {
    /// Untouched camera frame as `<stem>.jpg`.
    Raw,
    /// Frame with landmark dots as `<stem>.jpg`.
    Overlay,
    /// `<stem>_raw.jpg` and `<stem>_nodes.jpg`.
    Both,
}

/// Files produced for one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRecord {
    pub index: u32,
    pub images: Vec<PathBuf>,
    /// `None` when the detector found nothing in the frame.
    pub landmarks: Option<PathBuf>,
}

pub struct SampleWriter {
    variant: ImageVariant,
    schema: LandmarkSchema,
    jpeg_quality: u8,
}

impl SampleWriter {
    pub fn new(variant: ImageVariant, schema: LandmarkSchema, jpeg_quality: u8) -> Self {
        Self {
            variant,
            schema,
            jpeg_quality,
        }
    }

    /// Write the image(s) and, when landmarks were found, the JSON record.
    ///
    /// Images land before the JSON, each through a rename from a temporary
    /// sibling, so a landmark file never exists without its image.
    pub fn write(
        &self,
        request: &WriteRequest,
        frame: &Frame,
        detection: Option<&Detection>,
    ) -> Result<SampleRecord, Error> {
        fs::create_dir_all(&request.folder)?;

        let detection = detection.filter(|d| !d.is_empty());
        let folder = &request.folder;
        let stem = &request.stem;

        let mut images = Vec::new();
        match self.variant {
            ImageVariant::Raw => {
                let path = folder.join(format!("{}.jpg", stem));
                self.write_jpeg(&path, &frame.image)?;
                images.push(path);
            }
            ImageVariant::Overlay => {
                let path = folder.join(format!("{}.jpg", stem));
                self.write_jpeg(&path, &render_overlay(frame, detection))?;
                images.push(path);
            }
            ImageVariant::Both => {
                let raw = folder.join(format!("{}_raw.jpg", stem));
                self.write_jpeg(&raw, &frame.image)?;
                images.push(raw);

                let nodes = folder.join(format!("{}_nodes.jpg", stem));
                self.write_jpeg(&nodes, &render_overlay(frame, detection))?;
                images.push(nodes);
            }
        }

        let landmarks = match detection {
            Some(detection) => {
                let path = folder.join(format!("{}.json", stem));
                let json = self.schema.to_json(detection)?;
                write_atomic(&path, |w| w.write_all(json.as_bytes()))?;
                Some(path)
            }
            None => None,
        };

        debug!(
            "Wrote {} ({} image(s), landmarks: {})",
            stem,
            images.len(),
            landmarks.is_some()
        );

        Ok(SampleRecord {
            index: request.index,
            images,
            landmarks,
        })
    }

    fn write_jpeg(&self, path: &Path, image: &RgbImage) -> Result<(), Error> {
        let mut encoded = Vec::new();
        JpegEncoder::new_with_quality(&mut encoded, self.jpeg_quality).encode_image(image)?;
        write_atomic(path, |w| w.write_all(&encoded))?;
        Ok(())
    }
}

fn render_overlay(frame: &Frame, detection: Option<&Detection>) -> RgbImage {
    match detection {
        Some(detection) => overlay::draw_landmarks(&frame.image, detection),
        None => frame.image.clone(),
    }
}

/// Write through a `.tmp` sibling and rename into place.
fn write_atomic<F>(path: &Path, write: F) -> std::io::Result<()>
where
    F: FnOnce(&mut BufWriter<fs::File>) -> std::io::Result<()>,
{
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let result = (|| {
        let mut writer = BufWriter::new(fs::File::create(&tmp_path)?);
        write(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}
