//! Asset materialization: base64 picture payloads → PNG files on disk.
//!
//! The engine returns pictures in whatever format the source embedded
//! (JPEG scans, PNG diagrams). Every asset is decoded and re-encoded as PNG so
//! the `.png` references emitted by the layout analyzer are truthful.
//! Decoding is CPU-bound, so the whole batch runs in `spawn_blocking`.

use crate::error::Tender2MdError;
use crate::pipeline::layout::PendingAsset;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Write every pending asset under `base_dir`.
///
/// A single undecodable picture is logged and skipped; its reference stays in
/// the Markdown as a placeholder. Returns the number of files written.
pub async fn materialize_assets(
    base_dir: &Path,
    assets: Vec<PendingAsset>,
) -> Result<usize, Tender2MdError> {
    if assets.is_empty() {
        return Ok(0);
    }
    let base = base_dir.to_path_buf();
    tokio::task::spawn_blocking(move || materialize_blocking(&base, &assets))
        .await
        .map_err(|e| Tender2MdError::Internal(format!("Asset task panicked: {}", e)))?
}

fn materialize_blocking(base: &Path, assets: &[PendingAsset]) -> Result<usize, Tender2MdError> {
    let mut written = 0;
    for asset in assets {
        let target = base.join(&asset.reference);
        let bytes = match STANDARD.decode(asset.payload.data.trim()) {
            Ok(b) => b,
            Err(e) => {
                warn!("Skipping {}: invalid base64: {}", asset.reference, e);
                continue;
            }
        };
        let img = match image::load_from_memory(&bytes) {
            Ok(img) => img,
            Err(e) => {
                warn!(
                    "Skipping {}: undecodable {}: {}",
                    asset.reference, asset.payload.mime, e
                );
                continue;
            }
        };
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        img.save_with_format(&target, image::ImageFormat::Png)
            .map_err(|e| Tender2MdError::OutputWriteFailed {
                path: target.clone(),
                source: std::io::Error::other(e.to_string()),
            })?;
        debug!("Wrote asset {} ({}x{})", target.display(), img.width(), img.height());
        written += 1;
    }
    Ok(written)
}

fn io_err(path: &Path, source: std::io::Error) -> Tender2MdError {
    Tender2MdError::Io {
        path: PathBuf::from(path),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tree::ImagePayload;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    fn jpeg_b64() -> String {
        let img = image::DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 3, Rgba([200, 10, 10, 255])))
            .to_rgb8();
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)
            .unwrap();
        STANDARD.encode(&buf)
    }

    #[tokio::test]
    async fn writes_png_at_reference() {
        let dir = tempfile::tempdir().unwrap();
        let assets = vec![PendingAsset {
            reference: "images/doc/flow/picture-1.png".into(),
            payload: ImagePayload {
                mime: "image/jpeg".into(),
                data: jpeg_b64(),
            },
        }];
        let n = materialize_assets(dir.path(), assets).await.unwrap();
        assert_eq!(n, 1);
        let written = dir.path().join("images/doc/flow/picture-1.png");
        let png = std::fs::read(&written).unwrap();
        assert_eq!(&png[..4], b"\x89PNG");
        let back = image::open(&written).unwrap();
        assert_eq!((back.width(), back.height()), (4, 3));
    }

    #[tokio::test]
    async fn bad_payloads_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let assets = vec![
            PendingAsset {
                reference: "a.png".into(),
                payload: ImagePayload {
                    mime: "image/png".into(),
                    data: "!!not base64!!".into(),
                },
            },
            PendingAsset {
                reference: "b.png".into(),
                payload: ImagePayload {
                    mime: "image/png".into(),
                    data: STANDARD.encode(b"not an image"),
                },
            },
        ];
        assert_eq!(materialize_assets(dir.path(), assets).await.unwrap(), 0);
        assert!(!dir.path().join("a.png").exists());
    }
}
