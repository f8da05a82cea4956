use std::{
    io,
    path::{Path, PathBuf},
};
use tokio::{fs, io::AsyncWriteExt};
use tracing::debug;
use yatube_common::model::post::ImagePath;

const POST_IMAGE_DIR: &str = "posts";

/// Image types accepted for posts, recognised by their leading bytes.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum ImageFormat {
    Gif,
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    #[must_use]
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else {
            None
        }
    }

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Gif => "gif",
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
        }
    }
}

/// Uploaded files on disk, served under `/media/`.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes the image under a fresh random name.
    pub async fn save_post_image(&self, format: ImageFormat, bytes: &[u8]) -> io::Result<ImagePath> {
        let directory = self.root.join(POST_IMAGE_DIR);
        fs::create_dir_all(&directory).await?;

        let file_name = format!("{:016x}.{}", rand::random::<u64>(), format.extension());
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(directory.join(&file_name))
            .await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        debug!(%file_name, len = bytes.len(), "Stored post image");

        ImagePath::new(format!("{POST_IMAGE_DIR}/{file_name}")).map_err(io::Error::other)
    }
}
