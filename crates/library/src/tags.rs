//! Tag writing for finished downloads, backed by `lofty`.

use std::path::Path;

use async_trait::async_trait;
use lofty::config::WriteOptions;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::prelude::Accessor;
use lofty::read_from_path;
use lofty::tag::{ItemKey, Tag};
use shoal_engine::ProviderTrack;
use shoal_engine::orchestrator::{CollaboratorError, TagWriter};
use tracing::debug;

use crate::error::LibraryError;

const TRACK_ID_KEY: &str = "TRACK_ID";
const DOWNLOAD_DATE_KEY: &str = "DATE_DOWNLOADED";

/// Writes title, artist, album, the provider track id and a download
/// timestamp into the file's primary tag, plus front-cover art when given.
pub struct LoftyTagWriter;

impl LoftyTagWriter {
    fn write(
        path: &Path,
        track: &ProviderTrack,
        cover_jpeg: Option<&[u8]>,
    ) -> Result<(), LibraryError> {
        let mut tagged_file = read_from_path(path)?;
        if tagged_file.primary_tag_mut().is_none() {
            let tag_type = tagged_file.primary_tag_type();
            tagged_file.insert_tag(Tag::new(tag_type));
        }
        let Some(tag) = tagged_file.primary_tag_mut() else {
            return Err(LibraryError::payload("file accepts no tag"));
        };

        tag.set_title(track.title.clone());
        tag.set_artist(track.artist.clone());
        if !track.album.is_empty() {
            tag.set_album(track.album.clone());
        }
        tag.insert_text(
            ItemKey::Unknown(TRACK_ID_KEY.to_string()),
            track.id.to_string(),
        );
        tag.insert_text(
            ItemKey::Unknown(DOWNLOAD_DATE_KEY.to_string()),
            chrono::Local::now().to_rfc3339(),
        );

        if let Some(data) = cover_jpeg {
            let picture = Picture::new_unchecked(
                PictureType::CoverFront,
                Some(MimeType::Jpeg),
                Some("Cover".to_string()),
                data.to_vec(),
            );
            tag.push_picture(picture);
            debug!(size_kib = data.len() / 1024, "cover art embedded");
        }

        tagged_file.save_to_path(path, WriteOptions::default())?;
        debug!(path = %path.display(), track_id = track.id, "tags written");
        Ok(())
    }
}

#[async_trait]
impl TagWriter for LoftyTagWriter {
    async fn write_tags(
        &self,
        path: &Path,
        track: &ProviderTrack,
        cover_jpeg: Option<&[u8]>,
    ) -> Result<(), CollaboratorError> {
        Self::write(path, track, cover_jpeg).map_err(Into::into)
    }
}
