//! Media packing: embed a file's bytes in the document it belongs to.

use std::path::{Path, PathBuf};

use base64::prelude::BASE64_STANDARD;
use base64::Engine;

use poster_core::hash::hash_bytes;
use poster_core::{PosterError, PosterResult};
use poster_ir::asset::{PackedData, PACKED_PREFIX};
use poster_ir::{AssetDocument, MediaResource};

/// Self-relative path of packed media named `name`.
pub fn packed_path(name: &str) -> String {
    format!("{}{}", PACKED_PREFIX, name)
}

/// Resolve a media path against the directory of the document that uses it.
pub fn resolve_media_path(path: &str, base_dir: &Path) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

/// Check that an external media file exists, naming the resource if it does not.
pub fn ensure_media_exists(media: &MediaResource, base_dir: &Path) -> PosterResult<PathBuf> {
    let path = resolve_media_path(&media.path, base_dir);
    if path.is_file() {
        Ok(path)
    } else {
        Err(PosterError::UnresolvedMedia {
            resource: media.name.clone(),
            path,
        })
    }
}

/// Embed the media's bytes. Returns `false` if it was already packed.
pub fn pack_media(media: &mut MediaResource, base_dir: &Path) -> PosterResult<bool> {
    if !media.is_external() {
        return Ok(false);
    }
    let path = ensure_media_exists(media, base_dir)?;
    let bytes = std::fs::read(&path)?;
    media.packed = Some(PackedData {
        sha256: hash_bytes(&bytes).to_hex(),
        data_b64: BASE64_STANDARD.encode(&bytes),
    });
    media.path = packed_path(&media.name);
    tracing::debug!("packed {} ({} bytes) from {}", media.name, bytes.len(), path.display());
    Ok(true)
}

/// Decode packed bytes, verifying the stored digest.
pub fn unpack_bytes(media: &MediaResource) -> PosterResult<Vec<u8>> {
    let packed = media
        .packed
        .as_ref()
        .ok_or_else(|| PosterError::InvalidArgument(format!("media '{}' is not packed", media.name)))?;
    let bytes = BASE64_STANDARD
        .decode(packed.data_b64.as_bytes())
        .map_err(|e| PosterError::Other(format!("media '{}' has invalid packed data: {}", media.name, e)))?;
    if !hash_bytes(&bytes).matches_hex(&packed.sha256) {
        return Err(PosterError::Other(format!(
            "media '{}' packed data does not match its sha256",
            media.name
        )));
    }
    Ok(bytes)
}

/// Verify every packed media resource of `doc`.
pub fn verify_packed(doc: &AssetDocument) -> Result<(), Vec<PosterError>> {
    let errors: Vec<PosterError> = doc
        .media
        .iter()
        .filter(|m| m.packed.is_some())
        .filter_map(|m| unpack_bytes(m).err())
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_and_verify() {
        let dir = std::env::temp_dir().join(format!("poster_pack_{}", std::process::id()));
        std::fs::create_dir_all(dir.join("textures")).unwrap();
        std::fs::write(dir.join("textures/grain.png"), b"grain bytes").unwrap();

        let mut media = MediaResource::external("grain.png", "textures/grain.png");
        assert!(pack_media(&mut media, &dir).unwrap());
        assert_eq!(media.path, "//packed/grain.png");
        assert!(!media.is_external());
        assert_eq!(unpack_bytes(&media).unwrap(), b"grain bytes");
        // second pack is a no-op
        assert!(!pack_media(&mut media, &dir).unwrap());

        media.packed.as_mut().unwrap().sha256 = "00".repeat(32);
        assert!(unpack_bytes(&media).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_media_is_named() {
        let mut media = MediaResource::external("logo", "nowhere/logo.png");
        let err = pack_media(&mut media, Path::new("/nonexistent")).unwrap_err();
        match err {
            PosterError::UnresolvedMedia { resource, path } => {
                assert_eq!(resource, "logo");
                assert!(path.ends_with("nowhere/logo.png"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(media.is_external());
    }
}
