mod error;
mod ffmpeg;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

pub use error::{TranscodeError, TranscodeResult};
pub use ffmpeg::{gif_filter, FfmpegClip, FfmpegTranscoder};

#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn open(&self, input: &Path) -> TranscodeResult<Box<dyn MediaClip>>;
}

/// An opened media source. `close` must be safe to call more than once.
#[async_trait]
pub trait MediaClip: Send {
    async fn write_gif(&mut self, output: &Path, fps: u32) -> TranscodeResult<()>;
    fn close(&mut self) -> TranscodeResult<()>;
}

/// Closes the wrapped clip exactly once, either through `release` or on drop.
pub struct ClipGuard {
    clip: Box<dyn MediaClip>,
    input: PathBuf,
    released: bool,
}

impl ClipGuard {
    pub fn new(clip: Box<dyn MediaClip>, input: &Path) -> Self {
        Self {
            clip,
            input: input.to_path_buf(),
            released: false,
        }
    }

    pub fn clip_mut(&mut self) -> &mut dyn MediaClip {
        self.clip.as_mut()
    }

    pub fn release(mut self) {
        self.close_once();
    }

    fn close_once(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match self.clip.close() {
            Ok(()) => debug!(path = %self.input.display(), "media handle closed"),
            Err(err) => {
                warn!(path = %self.input.display(), error = %err, "error closing media handle")
            }
        }
    }
}

impl Drop for ClipGuard {
    fn drop(&mut self) {
        self.close_once();
    }
}

/// Opens `input`, writes an animated GIF to `output` and releases the media
/// handle before returning, whatever the outcome.
pub async fn convert(
    transcoder: &dyn Transcoder,
    input: &Path,
    output: &Path,
    fps: u32,
) -> TranscodeResult<()> {
    let clip = transcoder.open(input).await?;
    let mut guard = ClipGuard::new(clip, input);
    let result = guard.clip_mut().write_gif(output, fps).await;
    guard.release();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Journal {
        entries: Mutex<Vec<String>>,
    }

    impl Journal {
        fn push(&self, entry: impl Into<String>) {
            self.entries.lock().unwrap().push(entry.into());
        }

        fn entries(&self) -> Vec<String> {
            self.entries.lock().unwrap().clone()
        }
    }

    struct FakeClip {
        journal: Arc<Journal>,
        fail_write: bool,
        fail_close: bool,
    }

    #[async_trait]
    impl MediaClip for FakeClip {
        async fn write_gif(&mut self, output: &Path, fps: u32) -> TranscodeResult<()> {
            self.journal
                .push(format!("write {} @{fps}", output.display()));
            if self.fail_write {
                Err(TranscodeError::Encode("codec not supported".into()))
            } else {
                Ok(())
            }
        }

        fn close(&mut self) -> TranscodeResult<()> {
            self.journal.push("close");
            if self.fail_close {
                Err(TranscodeError::Encode("close failed".into()))
            } else {
                Ok(())
            }
        }
    }

    struct FakeTranscoder {
        journal: Arc<Journal>,
        fail_open: bool,
        fail_write: bool,
        fail_close: bool,
    }

    impl FakeTranscoder {
        fn new(journal: Arc<Journal>) -> Self {
            Self {
                journal,
                fail_open: false,
                fail_write: false,
                fail_close: false,
            }
        }
    }

    #[async_trait]
    impl Transcoder for FakeTranscoder {
        async fn open(&self, input: &Path) -> TranscodeResult<Box<dyn MediaClip>> {
            self.journal.push("open");
            if self.fail_open {
                return Err(TranscodeError::Open {
                    path: input.to_path_buf(),
                    reason: "corrupt".into(),
                });
            }
            Ok(Box::new(FakeClip {
                journal: Arc::clone(&self.journal),
                fail_write: self.fail_write,
                fail_close: self.fail_close,
            }))
        }
    }

    #[tokio::test]
    async fn releases_handle_after_success() {
        let journal = Arc::new(Journal::default());
        let transcoder = FakeTranscoder::new(Arc::clone(&journal));
        convert(&transcoder, Path::new("in.mp4"), Path::new("out.gif"), 12)
            .await
            .unwrap();
        assert_eq!(journal.entries(), vec!["open", "write out.gif @12", "close"]);
    }

    #[tokio::test]
    async fn releases_handle_after_write_failure() {
        let journal = Arc::new(Journal::default());
        let mut transcoder = FakeTranscoder::new(Arc::clone(&journal));
        transcoder.fail_write = true;
        let err = convert(&transcoder, Path::new("in.mp4"), Path::new("out.gif"), 12)
            .await
            .unwrap_err();
        assert!(matches!(err, TranscodeError::Encode(_)));
        assert_eq!(journal.entries().last().map(String::as_str), Some("close"));
    }

    #[tokio::test]
    async fn close_errors_do_not_mask_the_result() {
        let journal = Arc::new(Journal::default());
        let mut transcoder = FakeTranscoder::new(Arc::clone(&journal));
        transcoder.fail_close = true;
        convert(&transcoder, Path::new("in.mp4"), Path::new("out.gif"), 10)
            .await
            .expect("close failure is swallowed");
    }

    #[tokio::test]
    async fn open_failure_never_closes() {
        let journal = Arc::new(Journal::default());
        let mut transcoder = FakeTranscoder::new(Arc::clone(&journal));
        transcoder.fail_open = true;
        let err = convert(&transcoder, Path::new("in.mp4"), Path::new("out.gif"), 10)
            .await
            .unwrap_err();
        assert!(!err.is_file_access());
        assert_eq!(journal.entries(), vec!["open"]);
    }

    #[test]
    fn dropped_guard_closes_once() {
        let journal = Arc::new(Journal::default());
        let clip = FakeClip {
            journal: Arc::clone(&journal),
            fail_write: false,
            fail_close: false,
        };
        {
            let _guard = ClipGuard::new(Box::new(clip), Path::new("in.mp4"));
        }
        assert_eq!(journal.entries(), vec!["close"]);
    }
}
