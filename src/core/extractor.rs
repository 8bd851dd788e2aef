use crossbeam_channel::Sender;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use super::sampler::{sample_indices, SamplingMethod};
use super::session::SessionSummary;
use crate::config::ExtractionConfig;
use crate::decoder::{ImageSink, JpegWriter, SeekableSource, VideoFile};
use crate::error::CaptureResult;

/// Sample stills out of one finished recording.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionJob {
    pub source: PathBuf,
    pub output_dir: PathBuf,
    pub count: usize,
    pub method: SamplingMethod,
    pub stride: usize,
    pub quality: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionReport {
    pub extracted: usize,
    pub attempted: usize,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    /// Every sampled index was attempted.
    Complete(ExtractionReport),
    /// The source could not be opened; nothing was sampled.
    FailedToOpen(String),
    /// The output folder could not be created.
    Aborted(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionEvent {
    Started { source: PathBuf, total_frames: u64, planned: usize },
    Progress { done: usize, planned: usize, file: PathBuf },
    Skipped { frame: u64 },
    Finished(ExtractionOutcome),
}

/// `image_001.jpg`, `image_002.jpg`, ...
pub fn image_file_name(sequence: usize) -> String {
    format!("image_{:03}.jpg", sequence)
}

impl ExtractionJob {
    pub fn new(source: PathBuf, output_dir: PathBuf, config: &ExtractionConfig) -> Self {
        Self {
            source,
            output_dir,
            count: config.image_count,
            method: config.method,
            stride: config.frame_interval,
            quality: config.jpeg_quality,
        }
    }

    /// Job for a just-finished session: stills land in `<images>/video_<stamp>`.
    pub fn for_session(summary: &SessionSummary, config: &ExtractionConfig) -> Self {
        let output_dir = config.images_dir.join(format!("video_{}", summary.stamp));
        Self::new(summary.video_path.clone(), output_dir, config)
    }

    /// Job for an arbitrary video: stills land in `<images>/<file stem>`.
    pub fn for_video(source: &Path, config: &ExtractionConfig) -> Self {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        Self::new(source.to_path_buf(), config.images_dir.join(stem), config)
    }

    /// Run to completion. Decode failures skip the index; nothing is retried.
    /// Events are best effort, a closed receiver doesn't stop the job.
    pub fn run<S, O, I>(&self, open: O, sink: &mut I, events: &Sender<ExtractionEvent>) -> ExtractionOutcome
    where
        S: SeekableSource,
        O: FnOnce(&Path) -> CaptureResult<S>,
        I: ImageSink,
    {
        let outcome = self.run_inner(open, sink, events);
        match &outcome {
            ExtractionOutcome::Complete(report) => log::info!(
                "Image extraction complete: {}/{} images in {}",
                report.extracted,
                report.attempted,
                report.output_dir.display()
            ),
            ExtractionOutcome::FailedToOpen(reason) | ExtractionOutcome::Aborted(reason) => {
                log::error!("Image extraction failed for {}: {}", self.source.display(), reason)
            }
        }
        let _ = events.send(ExtractionEvent::Finished(outcome.clone()));
        outcome
    }

    fn run_inner<S, O, I>(&self, open: O, sink: &mut I, events: &Sender<ExtractionEvent>) -> ExtractionOutcome
    where
        S: SeekableSource,
        O: FnOnce(&Path) -> CaptureResult<S>,
        I: ImageSink,
    {
        if let Err(e) = fs::create_dir_all(&self.output_dir) {
            return ExtractionOutcome::Aborted(format!("{}: {}", self.output_dir.display(), e));
        }

        let mut source = match open(&self.source) {
            Ok(source) => source,
            Err(e) => return ExtractionOutcome::FailedToOpen(e.to_string()),
        };

        let total_frames = source.frame_count();
        let indices = sample_indices(self.method, total_frames, self.count, self.stride);
        let planned = indices.len();

        log::info!(
            "Extracting {} images from {} ({} frames @ {:.2} FPS, {})",
            planned,
            self.source.display(),
            total_frames,
            source.fps(),
            self.method
        );
        log::debug!("First indices: {:?}", &indices[..planned.min(5)]);
        let _ = events.send(ExtractionEvent::Started { source: self.source.clone(), total_frames, planned });

        let mut extracted = 0;
        for (i, &frame_index) in indices.iter().enumerate() {
            let file = self.output_dir.join(image_file_name(i + 1));
            match self.extract_one(&mut source, sink, frame_index, &file) {
                Ok(true) => {
                    extracted += 1;
                    log::debug!("Extracted {} (frame {})", file.display(), frame_index);
                    let _ = events.send(ExtractionEvent::Progress { done: i + 1, planned, file });
                }
                Ok(false) => {
                    log::warn!("Failed to read frame {}", frame_index);
                    let _ = events.send(ExtractionEvent::Skipped { frame: frame_index });
                }
                Err(e) => {
                    log::warn!("Failed to extract frame {}: {}", frame_index, e);
                    let _ = events.send(ExtractionEvent::Skipped { frame: frame_index });
                }
            }
        }

        ExtractionOutcome::Complete(ExtractionReport {
            extracted,
            attempted: planned,
            output_dir: self.output_dir.clone(),
        })
    }

    fn extract_one<S: SeekableSource, I: ImageSink>(
        &self,
        source: &mut S,
        sink: &mut I,
        frame_index: u64,
        file: &Path,
    ) -> CaptureResult<bool> {
        source.seek(frame_index)?;
        match source.read_frame()? {
            Some(frame) => {
                sink.write_image(file, &frame, self.quality)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Run a job on its own thread against its own decoder handle.
pub fn spawn_extraction(job: ExtractionJob, events: Sender<ExtractionEvent>) -> std::io::Result<JoinHandle<ExtractionOutcome>> {
    thread::Builder::new()
        .name("extractor".to_string())
        .spawn(move || {
            let mut sink = JpegWriter;
            job.run(|path: &Path| VideoFile::open(path), &mut sink, &events)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::FrameData;
    use crate::error::CaptureError;
    use std::collections::HashSet;

    struct FakeVideo {
        total: u64,
        broken: HashSet<u64>,
        position: u64,
        seeks: Vec<u64>,
    }

    impl FakeVideo {
        fn new(total: u64, broken: &[u64]) -> Self {
            Self { total, broken: broken.iter().copied().collect(), position: 0, seeks: Vec::new() }
        }
    }

    impl SeekableSource for FakeVideo {
        fn frame_count(&self) -> u64 {
            self.total
        }

        fn fps(&self) -> f64 {
            31.0
        }

        fn seek(&mut self, index: u64) -> CaptureResult<()> {
            self.position = index;
            self.seeks.push(index);
            Ok(())
        }

        fn read_frame(&mut self) -> CaptureResult<Option<FrameData>> {
            if self.position >= self.total || self.broken.contains(&self.position) {
                return Ok(None);
            }
            Ok(Some(FrameData::new(vec![self.position as u8; 3], 1, 1)))
        }
    }

    #[derive(Default)]
    struct MemorySink {
        written: Vec<(PathBuf, u8, i32)>,
    }

    impl ImageSink for MemorySink {
        fn write_image(&mut self, path: &Path, frame: &FrameData, quality: i32) -> CaptureResult<()> {
            self.written.push((path.to_path_buf(), frame.as_bytes()[0], quality));
            Ok(())
        }
    }

    fn job(dir: &Path, count: usize, method: SamplingMethod) -> ExtractionJob {
        ExtractionJob {
            source: dir.join("video_x.avi"),
            output_dir: dir.join("Images").join("video_x"),
            count,
            method,
            stride: 30,
            quality: 95,
        }
    }

    #[test]
    fn test_writes_sequential_files_at_sampled_frames() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path(), 4, SamplingMethod::EvenlySpaced);
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut sink = MemorySink::default();

        let outcome = job.run(|_| Ok(FakeVideo::new(40, &[])), &mut sink, &tx);

        let expected_dir = dir.path().join("Images").join("video_x");
        assert_eq!(
            outcome,
            ExtractionOutcome::Complete(ExtractionReport { extracted: 4, attempted: 4, output_dir: expected_dir.clone() })
        );
        assert!(expected_dir.is_dir());
        let names: Vec<_> = sink.written.iter().map(|(p, _, _)| p.file_name().unwrap().to_string_lossy().into_owned()).collect();
        assert_eq!(names, vec!["image_001.jpg", "image_002.jpg", "image_003.jpg", "image_004.jpg"]);
        let frames: Vec<u8> = sink.written.iter().map(|(_, f, _)| *f).collect();
        assert_eq!(frames, vec![0, 10, 20, 30]);
        assert!(sink.written.iter().all(|(_, _, q)| *q == 95));

        let events: Vec<_> = rx.try_iter().collect();
        assert!(matches!(events.first(), Some(ExtractionEvent::Started { total_frames: 40, planned: 4, .. })));
        assert!(matches!(events.last(), Some(ExtractionEvent::Finished(ExtractionOutcome::Complete(_)))));
    }

    #[test]
    fn test_decode_failure_is_skipped_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path(), 5, SamplingMethod::EvenlySpaced);
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut sink = MemorySink::default();

        let outcome = job.run(|_| Ok(FakeVideo::new(5, &[2])), &mut sink, &tx);

        match outcome {
            ExtractionOutcome::Complete(report) => {
                assert_eq!(report.extracted, 4);
                assert_eq!(report.attempted, 5);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        // Sequence numbers follow the sampled position, so image_003 is missing.
        let names: Vec<_> = sink.written.iter().map(|(p, _, _)| p.file_name().unwrap().to_string_lossy().into_owned()).collect();
        assert_eq!(names, vec!["image_001.jpg", "image_002.jpg", "image_004.jpg", "image_005.jpg"]);
        let skipped: Vec<_> = rx.try_iter().filter(|e| matches!(e, ExtractionEvent::Skipped { .. })).collect();
        assert_eq!(skipped, vec![ExtractionEvent::Skipped { frame: 2 }]);
    }

    #[test]
    fn test_open_failure_samples_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path(), 5, SamplingMethod::EvenlySpaced);
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut sink = MemorySink::default();

        let outcome = job.run(
            |path: &Path| -> CaptureResult<FakeVideo> { Err(CaptureError::SourceOpen { path: path.to_path_buf() }) },
            &mut sink,
            &tx,
        );

        assert!(matches!(outcome, ExtractionOutcome::FailedToOpen(_)));
        assert!(sink.written.is_empty());
    }

    #[test]
    fn test_empty_recording_completes() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path(), 100, SamplingMethod::EvenlySpaced);
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut sink = MemorySink::default();

        let outcome = job.run(|_| Ok(FakeVideo::new(0, &[])), &mut sink, &tx);

        match outcome {
            ExtractionOutcome::Complete(report) => {
                assert_eq!((report.extracted, report.attempted), (0, 0));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_interval_method_seeks_by_stride() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path(), 100, SamplingMethod::Interval);
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut sink = MemorySink::default();

        job.run(|_| Ok(FakeVideo::new(95, &[])), &mut sink, &tx);

        let frames: Vec<u8> = sink.written.iter().map(|(_, f, _)| *f).collect();
        assert_eq!(frames, vec![0, 30, 60, 90]);
    }

    #[test]
    fn test_dropped_receiver_does_not_stop_job() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path(), 3, SamplingMethod::EvenlySpaced);
        let (tx, rx) = crossbeam_channel::unbounded();
        drop(rx);
        let mut sink = MemorySink::default();

        job.run(|_| Ok(FakeVideo::new(9, &[])), &mut sink, &tx);
        assert_eq!(sink.written.len(), 3);
    }

    #[test]
    fn test_session_job_folder_uses_stamp() {
        let summary = SessionSummary {
            stamp: "20240101_120000".into(),
            video_path: PathBuf::from("Recordings/video_20240101_120000.avi"),
            frames: 0,
            elapsed: std::time::Duration::ZERO,
            average_fps: 0.0,
        };
        let job = ExtractionJob::for_session(&summary, &ExtractionConfig::default());
        assert_eq!(job.output_dir, PathBuf::from("Images/video_20240101_120000"));
        assert_eq!(job.source, summary.video_path);
        assert_eq!(job.count, 100);
    }

    #[test]
    fn test_image_file_name_padding() {
        assert_eq!(image_file_name(1), "image_001.jpg");
        assert_eq!(image_file_name(1000), "image_1000.jpg");
    }
}
