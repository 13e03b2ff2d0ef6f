use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use chrono::{DateTime, Local};
use archive::{Archive, SubjectInfo};
use crate::error::{PipelineError, Result};

/// does not matter: the subject has no unprocessed diffusion data
pub const DNM:&str = "---";
/// not available
pub const NA:&str = "N/A";
pub const DATE_FORMAT:&str = "%Y-%m-%d %H:%M:%S";

pub const HEADER:&str = "Project\tReference Project\tSubject ID\tPackage Path\tPackage Exists\tPackage Date\tPackage Size\tChecksum Exists\tChecksum Date";

#[derive(Clone,Debug,PartialEq,Eq)]
pub struct PackageReportRow {
    pub project:String,
    pub reference_project:String,
    pub subject_id:String,
    pub package_path:PathBuf,
    pub package_exists:String,
    pub package_date:String,
    pub package_size:String,
    pub checksum_exists:String,
    pub checksum_date:String,
}

impl fmt::Display for PackageReportRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,"{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.project,
            self.reference_project,
            self.subject_id,
            self.package_path.display(),
            self.package_exists,
            self.package_date,
            self.package_size,
            self.checksum_exists,
            self.checksum_date,
        )
    }
}

fn yes_no(b:bool) -> String {
    match b {
        true => String::from("True"),
        false => String::from("False")
    }
}

fn file_date(path:&Path) -> Option<String> {
    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(DateTime::<Local>::from(modified).format(DATE_FORMAT).to_string())
}

pub fn diffusion_package_path(packages_root:&Path,archive:&dyn Archive,subject:&SubjectInfo) -> PathBuf {
    packages_root.join("prerelease").join("zip")
        .join(&subject.project)
        .join(&subject.subject_id)
        .join("preproc")
        .join(format!("{}_{}_Diffusion_preproc.zip",subject.subject_id,archive.tesla_spec()))
}

pub fn diffusion_package_row(packages_root:&Path,archive:&dyn Archive,subject:&SubjectInfo) -> Result<PackageReportRow> {
    let package_path = diffusion_package_path(packages_root,archive,subject);
    let checksum_path = PathBuf::from(format!("{}.md5",package_path.display()));

    let mut row = PackageReportRow {
        project:subject.project.clone(),
        reference_project:subject.structural_reference_project.clone().unwrap_or_else(|| String::from("None")),
        subject_id:subject.subject_id.clone(),
        package_path:package_path.clone(),
        package_exists:DNM.to_string(),
        package_date:DNM.to_string(),
        package_size:DNM.to_string(),
        checksum_exists:DNM.to_string(),
        checksum_date:DNM.to_string(),
    };

    if !archive.does_diffusion_unproc_dir_exist(subject)? {
        return Ok(row)
    }

    let package_exists = package_path.is_file();
    row.package_exists = yes_no(package_exists);
    row.package_date = NA.to_string();
    row.package_size = NA.to_string();
    if package_exists {
        row.package_date = file_date(&package_path).unwrap_or_else(|| NA.to_string());
        let size = fs::metadata(&package_path).map_err(|e| PipelineError::io(&package_path,e))?.len();
        row.package_size = utils::human_readable_byte_size(size,1000.0);
    }

    let checksum_exists = checksum_path.is_file();
    row.checksum_exists = yes_no(checksum_exists);
    row.checksum_date = match checksum_exists {
        true => file_date(&checksum_path).unwrap_or_else(|| NA.to_string()),
        false => NA.to_string()
    };
    Ok(row)
}

pub fn write_diffusion_package_report(packages_root:&Path,archive:&dyn Archive,subjects:&[SubjectInfo],output:&mut dyn Write) -> Result<()> {
    let err = |e| PipelineError::io("<report output>",e);
    writeln!(output,"{}",HEADER).map_err(err)?;
    for subject in subjects {
        let row = diffusion_package_row(packages_root,archive,subject)?;
        writeln!(output,"{}",row).map_err(err)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use archive::{ArchiveSettings, Hcp7TArchive};

    #[test]
    fn rows_for_missing_and_present_packages(){
        let dir = tempfile::tempdir().unwrap();
        let packages = dir.path().join("packages");
        let a = Hcp7TArchive::new(ArchiveSettings::new(&dir.path().join("archive"),&dir.path().join("build")));
        let with_data = SubjectInfo::new("HCP_Staging_7T","102311").with_reference_project("HCP_1200");
        let without_data = SubjectInfo::new("HCP_Staging_7T","104416").with_reference_project("HCP_1200");
        fs::create_dir_all(a.subject_resources_dir(&with_data).unwrap().join("Diffusion_unproc")).unwrap();

        let row = diffusion_package_row(&packages,&a,&without_data).unwrap();
        assert_eq!(row.package_exists,DNM);
        assert_eq!(row.checksum_date,DNM);

        let row = diffusion_package_row(&packages,&a,&with_data).unwrap();
        assert_eq!(row.package_exists,"False");
        assert_eq!(row.package_size,NA);

        let package = diffusion_package_path(&packages,&a,&with_data);
        assert!(package.ends_with("prerelease/zip/HCP_Staging_7T/102311/preproc/102311_7T_Diffusion_preproc.zip"));
        fs::create_dir_all(package.parent().unwrap()).unwrap();
        fs::write(&package,vec![0u8;1500]).unwrap();
        let row = diffusion_package_row(&packages,&a,&with_data).unwrap();
        assert_eq!(row.package_exists,"True");
        assert_eq!(row.package_size,"1.5 KB");
        assert_eq!(row.package_date.len(),19);
        assert_eq!(row.checksum_exists,"False");
        assert_eq!(row.to_string().split('\t').count(),9);
    }
}
