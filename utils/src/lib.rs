use std::path::{Path, PathBuf};
use std::fs::File;
use std::io::{self, Write, Read};
use glob::glob;
use walkdir::WalkDir;
use thiserror::Error;

#[derive(Error,Debug)]
pub enum EnvError {
    #[error("environment variable {0} must be set")]
    Missing(String),
    #[error("environment variable {0} is not valid unicode")]
    NotUnicode(String),
}

/// fetch an environment variable that the tooling cannot run without
pub fn getenv_required(name:&str) -> Result<String,EnvError> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        Ok(_) | Err(std::env::VarError::NotPresent) => Err(EnvError::Missing(name.to_string())),
        Err(std::env::VarError::NotUnicode(_)) => Err(EnvError::NotUnicode(name.to_string())),
    }
}

pub fn read_to_string(filepath:&Path,extension:&str) -> io::Result<String> {
    let p = filepath.with_extension(extension);
    let mut f = File::open(&p)?;
    let mut s = String::new();
    f.read_to_string(&mut s)?;
    Ok(s)
}

pub fn write_to_file(filepath:&Path,extension:&str,string:&str) -> io::Result<PathBuf> {
    let p = filepath.with_extension(extension);
    let mut f = File::create(&p)?;
    f.write_all(string.as_bytes())?;
    Ok(p)
}

/// strip any trailing newline characters (both \n and \r\n)
pub fn remove_ending_new_lines(s:&str) -> String {
    s.trim_end_matches(|c| c == '\n' || c == '\r').to_string()
}

pub fn trim_newline(s: &mut String) {
    while s.ends_with('\n') || s.ends_with('\r') {
        s.pop();
    }
}

// single depth search, sorted so callers see a stable order
pub fn get_all_matches(dir:&Path,pattern:&str) -> Option<Vec<PathBuf>> {
    let pat = dir.join(pattern);
    let pat = pat.to_str()?;
    let mut matches:Vec<PathBuf> = match glob(pat) {
        Ok(paths) => paths.flat_map(|m| m).collect(),
        Err(_) => return None
    };
    matches.sort();
    match matches.is_empty() {
        true => None,
        false => Some(matches)
    }
}

/// recursive walk collecting files whose names contain any of the given fragments
pub fn find_files_containing(base_dir:&Path,fragments:&[&str]) -> Vec<PathBuf> {
    let mut files:Vec<PathBuf> = WalkDir::new(base_dir).into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| !e.file_type().is_dir())
        .filter(|e| {
            let name = e.file_name().to_string_lossy();
            fragments.iter().any(|frag| name.contains(frag))
        })
        .map(|e| e.path().to_owned())
        .collect();
    files.sort();
    files
}

/// format a byte count using the given factor (1000 or 1024) between units
pub fn human_readable_byte_size(size:u64,factor:f64) -> String {
    const UNITS:[&str;6] = ["B","KB","MB","GB","TB","PB"];
    let mut value = size as f64;
    let mut unit = 0;
    while value >= factor && unit < UNITS.len()-1 {
        value /= factor;
        unit += 1;
    }
    match unit {
        0 => format!("{} {}",size,UNITS[0]),
        _ => format!("{:.1} {}",value,UNITS[unit])
    }
}
