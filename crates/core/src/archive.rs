//! Zip packaging of submission outputs.

use std::fs::{self, File};
use std::io::{self, Cursor, Seek, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::CoreError;
use crate::files::REPORT_ARCHIVE;

fn options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Package the output of a finished submission into `{submit_dir}/report.zip`.
///
/// Every regular file directly inside an immediate subdirectory is stored as
/// `{subdir}/{file}`. Files at the submission root (the input artifact, the
/// archive itself) are left out.
pub fn write_report(submit_dir: &Path) -> Result<(), CoreError> {
    let target = submit_dir.join(REPORT_ARCHIVE);
    let tmp = submit_dir.join(format!(".{REPORT_ARCHIVE}.tmp"));

    let mut writer = ZipWriter::new(File::create(&tmp)?);
    let result = add_output_directories(&mut writer, submit_dir);
    let finished = result.and_then(|()| writer.finish().map_err(CoreError::from));

    match finished {
        Ok(file) => {
            file.sync_all()?;
            fs::rename(&tmp, &target)?;
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}

fn add_output_directories<W: Write + Seek>(
    writer: &mut ZipWriter<W>,
    submit_dir: &Path,
) -> Result<(), CoreError> {
    let mut dirs: Vec<_> = fs::read_dir(submit_dir)?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();

    for dir in dirs {
        let dir_name = entry_name(&dir)?;
        let mut files: Vec<_> = fs::read_dir(&dir)?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        files.sort();

        for file in files {
            let name = format!("{dir_name}/{}", entry_name(&file)?);
            add_file(writer, &file, &name)?;
        }
    }
    Ok(())
}

/// Zip a directory tree into memory, entries relative to `dir`.
pub fn zip_directory(dir: &Path) -> Result<Vec<u8>, CoreError> {
    if !dir.is_dir() {
        return Err(CoreError::NotFound {
            entity: "directory",
            id: dir.display().to_string(),
        });
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    add_tree(&mut writer, dir, "")?;
    Ok(writer.finish()?.into_inner())
}

fn add_tree<W: Write + Seek>(
    writer: &mut ZipWriter<W>,
    dir: &Path,
    prefix: &str,
) -> Result<(), CoreError> {
    let mut entries: Vec<_> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .collect();
    entries.sort();

    for path in entries {
        let name = format!("{prefix}{}", entry_name(&path)?);
        if path.is_dir() {
            add_tree(writer, &path, &format!("{name}/"))?;
        } else if path.is_file() {
            add_file(writer, &path, &name)?;
        }
    }
    Ok(())
}

fn add_file<W: Write + Seek>(
    writer: &mut ZipWriter<W>,
    path: &Path,
    name: &str,
) -> Result<(), CoreError> {
    writer.start_file(name, options())?;
    let mut source = File::open(path)?;
    io::copy(&mut source, writer)?;
    Ok(())
}

fn entry_name(path: &Path) -> Result<String, CoreError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| CoreError::Internal(format!("non UTF-8 path {}", path.display())))
}
