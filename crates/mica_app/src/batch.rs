//! Batch orchestration: one independent split pipeline per container file,
//! fanned out over a bounded worker pool. A failure in one file never blocks
//! or corrupts another; the only shared resource is the destination tree.

use crate::report::{FileReport, FileStatus, UnitRecord};
use anyhow::{Context, Result};
use crossbeam_channel::bounded;
use indicatif::{ProgressBar, ProgressStyle};
use mica_core::{carving, channels, metadata, naming, palette, tiff, PixelBuffer};
use mica_io::{writer, ContainerReader};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

pub struct BatchOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub jobs: usize,
}

#[derive(Default)]
pub struct BatchOutcome {
    pub reports: Vec<FileReport>,
    pub bytes_processed: u64,
    pub cancelled: bool,
}

impl BatchOutcome {
    #[must_use]
    pub fn units_written(&self) -> usize {
        self.reports.iter().map(|r| r.units.len()).sum()
    }

    #[must_use]
    pub fn files_failed(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.status == FileStatus::Failed)
            .count()
    }
}

/// Lists the container files of one input directory, sorted by name.
pub fn discover_containers(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read input directory {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let is_container = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("jpk"))
            .unwrap_or(false);
        if is_container {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn run(options: &BatchOptions, running: &AtomicBool) -> Result<BatchOutcome> {
    let files = discover_containers(&options.input)?;
    if files.is_empty() {
        println!(
            "[Batch] No .jpk container files in {}",
            options.input.display()
        );
        return Ok(BatchOutcome::default());
    }
    fs::create_dir_all(&options.output).with_context(|| {
        format!(
            "Failed to create output directory {}",
            options.output.display()
        )
    })?;

    let jobs = options.jobs.clamp(1, files.len());
    println!(
        "[Batch] {} container file(s), {} worker(s)",
        files.len(),
        jobs
    );

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} containers")
            .expect("invalid progress bar template - this is a bug")
            .progress_chars("##-"),
    );

    let (file_tx, file_rx) = bounded::<PathBuf>(files.len());
    let (result_tx, result_rx) = bounded::<(FileReport, u64)>(files.len());
    for file in &files {
        let _ = file_tx.send(file.clone());
    }
    drop(file_tx);

    let mut reports = Vec::with_capacity(files.len());
    let mut bytes_processed = 0u64;

    thread::scope(|scope| {
        for _ in 0..jobs {
            let file_rx = file_rx.clone();
            let result_tx = result_tx.clone();
            let output = options.output.as_path();
            scope.spawn(move || {
                for path in file_rx {
                    // Finish the file in flight, stop picking up new ones.
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    let outcome = process_file(&path, output);
                    if result_tx.send(outcome).is_err() {
                        break;
                    }
                }
            });
        }
        drop(file_rx);
        drop(result_tx);

        for (report, bytes) in result_rx.iter() {
            match &report.error {
                Some(error) => {
                    pb.println(format!("[Batch] Error processing {}: {}", report.file, error));
                }
                None => {
                    pb.println(format!("[Batch] {}: {} unit(s)", report.file, report.units.len()));
                }
            }
            for warning in &report.page_failures {
                pb.println(format!("[Batch] {}: warning: {}", report.file, warning));
            }
            bytes_processed += bytes;
            reports.push(report);
            pb.inc(1);
        }
    });

    pb.finish_and_clear();
    // Workers race; the report order should not.
    reports.sort_by(|a, b| a.file.cmp(&b.file));

    Ok(BatchOutcome {
        reports,
        bytes_processed,
        cancelled: !running.load(Ordering::SeqCst),
    })
}

fn process_file(path: &Path, output_root: &Path) -> (FileReport, u64) {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    match split_container(path, output_root) {
        Ok((units, page_failures, bytes)) => (
            FileReport {
                file: file_name,
                status: FileStatus::Ok,
                error: None,
                page_failures,
                units,
            },
            bytes,
        ),
        Err(error) => (
            FileReport {
                file: file_name,
                status: FileStatus::Failed,
                error: Some(format!("{:#}", error)),
                page_failures: Vec::new(),
                units: Vec::new(),
            },
            0,
        ),
    }
}

/// The sequential pipeline for one container file: carve, decode, group,
/// resolve roles, then persist one unit per (channel, role) page.
fn split_container(
    path: &Path,
    output_root: &Path,
) -> Result<(Vec<UnitRecord>, Vec<String>, u64)> {
    let reader =
        ContainerReader::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let data = reader.bytes();

    // The carve runs on the whole file, independent of structural decoding.
    let ascii_blob = carving::carve_printable(data, 1);
    let container = tiff::parse_container(data)
        .with_context(|| format!("Failed to decode {}", path.display()))?;

    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "container".to_string());

    let mut units = Vec::new();
    for group in channels::group_by_channel(&container.pages) {
        for (role, page) in channels::assign_roles(&group) {
            let expanded = palette::expand_page(&page.pixels)
                .with_context(|| format!("Failed to expand palette of page {}", page.index))?;
            let pixels = expanded.as_ref().unwrap_or(&page.pixels);

            let description = metadata::compose(&ascii_blob, &page.tags);
            let paths = naming::unit_paths(output_root, &stem, &group.name, role);

            writer::write_unit(&paths, page.width, page.height, pixels, &description)
                .with_context(|| format!("Failed to write unit {}_{}", group.name, role))?;
            anyhow::ensure!(
                validate_written_image(&paths.image, pixels),
                "Written image failed decode validation: {}",
                paths.image.display()
            );

            let image_sha256 = sha256_of(&paths.image)?;
            units.push(UnitRecord {
                channel: group.name.clone(),
                role: role.to_string(),
                image: paths.image,
                metadata: paths.metadata,
                image_sha256,
            });
        }
    }

    let page_failures = container
        .page_failures
        .iter()
        .map(|failure| format!("page {}: {}", failure.index, failure.error))
        .collect();

    Ok((units, page_failures, data.len() as u64))
}

fn validate_written_image(path: &Path, pixels: &PixelBuffer) -> bool {
    match pixels {
        PixelBuffer::Gray8(_) | PixelBuffer::Gray16(_) | PixelBuffer::Rgb8(_) => {}
        // Sample layouts the image crate cannot decode are accepted as-is.
        _ => return true,
    }

    let file = match File::open(path) {
        Ok(file) => file,
        Err(_) => return false,
    };
    image::load(BufReader::new(file), image::ImageFormat::Tiff).is_ok()
}

fn sha256_of(path: &Path) -> Result<String> {
    let data = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(format!("{:x}", hasher.finalize()))
}
