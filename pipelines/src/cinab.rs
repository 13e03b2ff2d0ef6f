//! Retrieval of a subject's archived resources into a CinaB (Connectome in a Box) style
//! study directory, by copying with rsync or by building a tree of symbolic links.
//!
//! Copies are made in the order the pipelines produced the data, so later outputs overwrite
//! earlier ones. Links are made in reverse order and an existing link is never replaced, so
//! the later output wins in both modes.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use clap::ValueEnum;
use walkdir::WalkDir;
use archive::{Archive, SubjectInfo};
use archive::archive::TESLA_SPEC_3T;
use archive::resource::UNPROC_SUFFIX;
use archive::scan_name::NAME_DELIMITER;
use crate::error::{PipelineError, Result};

/// file name endings of XNAT bookkeeping files removed from a retrieved tree
pub const XNAT_SPECIFIC_FILE_ENDINGS:[&str;2] = ["_catalog.xml","_Provenance.xml"];

#[derive(Clone,Copy,Debug,PartialEq,Eq,ValueEnum)]
pub enum Phase {
    #[value(name = "FULL")]
    Full,
    #[value(name = "DIFFUSION_PREPROC_VETTING")]
    DiffusionPreprocVetting,
    #[value(name = "MULTIRUNICAFIX_PREREQS")]
    MultiRunIcaFixPrereqs,
    #[value(name = "ICAFIX")]
    IcaFix,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Full => "FULL",
            Phase::DiffusionPreprocVetting => "DIFFUSION_PREPROC_VETTING",
            Phase::MultiRunIcaFixPrereqs => "MULTIRUNICAFIX_PREREQS",
            Phase::IcaFix => "ICAFIX",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,"{}",self.as_str())
    }
}

/// Link every file under `from` into the same relative location under `to`.
/// Files already present under `to` are left alone. Returns the number of links made.
pub fn link_tree(from:&Path,to:&Path) -> Result<usize> {
    let mut linked = 0;
    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(|p| p.to_owned()).unwrap_or_else(|| from.to_owned());
            PipelineError::io(path,e.into())
        })?;
        let relative = match entry.path().strip_prefix(from) {
            Ok(r) => r,
            Err(_) => continue
        };
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| PipelineError::io(&target,e))?;
            continue
        }
        if fs::symlink_metadata(&target).is_ok() {
            continue
        }
        std::os::unix::fs::symlink(entry.path(),&target).map_err(|e| PipelineError::io(&target,e))?;
        linked += 1;
    }
    Ok(linked)
}

/// remove every entry of `dir` that is not itself a directory
pub fn remove_non_subdirs(dir:&Path) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| PipelineError::io(dir,e))?;
    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::io(dir,e))?;
        let file_type = entry.file_type().map_err(|e| PipelineError::io(entry.path(),e))?;
        if !file_type.is_dir() {
            fs::remove_file(entry.path()).map_err(|e| PipelineError::io(entry.path(),e))?;
        }
    }
    Ok(())
}

/// remove XNAT catalog and provenance files anywhere under `dir`
pub fn clean_xnat_specific_files(dir:&Path) -> Result<usize> {
    let doomed = utils::find_files_containing(dir,&XNAT_SPECIFIC_FILE_ENDINGS);
    for f in &doomed {
        fs::remove_file(f).map_err(|e| PipelineError::io(f,e))?;
    }
    tracing::debug!("removed {} XNAT specific files from {:?}",doomed.len(),dir);
    Ok(doomed.len())
}

pub struct CinabStyleDataRetriever<'a> {
    archive:&'a dyn Archive,
    /// rsync the data rather than link to it
    pub copy:bool,
    pub show_log:bool,
    pub rsync_program:String,
}

impl<'a> CinabStyleDataRetriever<'a> {
    pub fn new(archive:&'a dyn Archive) -> Self {
        Self {
            archive,
            copy:false,
            show_log:false,
            rsync_program:String::from("rsync"),
        }
    }

    fn is_3t(&self) -> bool {
        self.archive.tesla_spec() == TESLA_SPEC_3T
    }

    fn from_to(&self,get_from:&Path,put_to:&Path) -> Result<()> {
        fs::create_dir_all(put_to).map_err(|e| PipelineError::io(put_to,e))?;
        if self.show_log {
            tracing::info!("{} {:?} -> {:?}",if self.copy { "copying" } else { "linking" },get_from,put_to);
        }
        match self.copy {
            true => {
                let mut cmd = Command::new(&self.rsync_program);
                cmd.arg("-a");
                if self.show_log {
                    cmd.arg("-v");
                }
                cmd.arg(format!("{}/",get_from.display())).arg(put_to);
                let status = cmd.status().map_err(|source| PipelineError::Launch { program:self.rsync_program.clone(), source })?;
                match status.success() {
                    true => Ok(()),
                    false => Err(PipelineError::CommandFailed { program:self.rsync_program.clone(), status })
                }
            }
            false => link_tree(get_from,put_to).map(|_| ())
        }
    }

    /// Processed resources mirror the subject directory. A resource that holds the
    /// subject directory itself is placed directly in the study directory.
    fn processed_destination(&self,resource_dir:&Path,subject:&SubjectInfo,study_dir:&Path) -> PathBuf {
        match resource_dir.join(&subject.subject_id).is_dir() {
            true => study_dir.to_owned(),
            false => study_dir.join(&subject.subject_id)
        }
    }

    fn unproc_destination(&self,resource_dir:&Path,subject:&SubjectInfo,study_dir:&Path,tesla:&str) -> PathBuf {
        let dir_name = resource_dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        let ending = format!("{}{}",NAME_DELIMITER,UNPROC_SUFFIX);
        let sub_dir = dir_name.strip_suffix(&ending).unwrap_or(&dir_name).to_string();
        study_dir.join(&subject.subject_id).join("unprocessed").join(tesla).join(sub_dir)
    }

    fn get_unproc_dirs(&self,dirs:Vec<PathBuf>,subject:&SubjectInfo,study_dir:&Path,tesla:&str) -> Result<()> {
        for dir in dirs {
            let put_to = self.unproc_destination(&dir,subject,study_dir,tesla);
            self.from_to(&dir,&put_to)?;
        }
        Ok(())
    }

    fn get_processed_dirs(&self,dirs:Vec<PathBuf>,subject:&SubjectInfo,study_dir:&Path) -> Result<()> {
        for dir in dirs {
            let put_to = self.processed_destination(&dir,subject,study_dir);
            self.from_to(&dir,&put_to)?;
        }
        Ok(())
    }

    pub fn get_structural_unproc_data(&self,subject:&SubjectInfo,study_dir:&Path) -> Result<()> {
        let dirs = self.archive.available_structural_unproc_dirs(subject)?;
        self.get_unproc_dirs(dirs,subject,study_dir,TESLA_SPEC_3T)
    }

    pub fn get_functional_unproc_data(&self,subject:&SubjectInfo,study_dir:&Path) -> Result<()> {
        let dirs = self.archive.available_functional_unproc_dirs(subject)?;
        self.get_unproc_dirs(dirs,subject,study_dir,self.archive.tesla_spec())
    }

    pub fn get_diffusion_unproc_data(&self,subject:&SubjectInfo,study_dir:&Path) -> Result<()> {
        let dirs = self.archive.available_diffusion_unproc_dirs(subject)?;
        self.get_unproc_dirs(dirs,subject,study_dir,self.archive.tesla_spec())
    }

    pub fn get_structural_preproc_data(&self,subject:&SubjectInfo,study_dir:&Path) -> Result<()> {
        let dirs = self.archive.available_structural_preproc_dirs(subject)?;
        self.get_processed_dirs(dirs,subject,study_dir)
    }

    pub fn get_supplemental_structural_preproc_data(&self,subject:&SubjectInfo,study_dir:&Path) -> Result<()> {
        let dirs = self.archive.available_supplemental_structural_preproc_dirs(subject)?;
        self.get_processed_dirs(dirs,subject,study_dir)
    }

    pub fn get_functional_preproc_data(&self,subject:&SubjectInfo,study_dir:&Path) -> Result<()> {
        let dirs = self.archive.available_functional_preproc_dirs(subject)?;
        self.get_processed_dirs(dirs,subject,study_dir)
    }

    pub fn get_diffusion_preproc_data(&self,subject:&SubjectInfo,study_dir:&Path) -> Result<()> {
        let dirs = self.archive.available_diffusion_preproc_dirs(subject)?;
        self.get_processed_dirs(dirs,subject,study_dir)
    }

    pub fn get_icafix_data(&self,subject:&SubjectInfo,study_dir:&Path) -> Result<()> {
        let dirs = self.archive.available_fix_processed_dirs(subject)?;
        self.get_processed_dirs(dirs,subject,study_dir)
    }

    pub fn get_resting_state_stats_data(&self,subject:&SubjectInfo,study_dir:&Path) -> Result<()> {
        let dirs = self.archive.available_rss_processed_dirs(subject)?;
        self.get_processed_dirs(dirs,subject,study_dir)
    }

    pub fn get_unproc_data(&self,subject:&SubjectInfo,study_dir:&Path) -> Result<()> {
        if self.is_3t() {
            self.get_structural_unproc_data(subject,study_dir)?;
        }
        self.get_functional_unproc_data(subject,study_dir)?;
        self.get_diffusion_unproc_data(subject,study_dir)
    }

    pub fn get_preproc_data(&self,subject:&SubjectInfo,study_dir:&Path) -> Result<()> {
        match self.copy {
            true => {
                if self.is_3t() {
                    self.get_structural_preproc_data(subject,study_dir)?;
                    self.get_supplemental_structural_preproc_data(subject,study_dir)?;
                }
                self.get_functional_preproc_data(subject,study_dir)?;
                self.get_diffusion_preproc_data(subject,study_dir)
            }
            false => {
                self.get_diffusion_preproc_data(subject,study_dir)?;
                self.get_functional_preproc_data(subject,study_dir)?;
                if self.is_3t() {
                    self.get_supplemental_structural_preproc_data(subject,study_dir)?;
                    self.get_structural_preproc_data(subject,study_dir)?;
                }
                Ok(())
            }
        }
    }

    pub fn get_diffusion_preproc_vetting_data(&self,subject:&SubjectInfo,study_dir:&Path) -> Result<()> {
        match self.copy {
            true => {
                self.get_structural_preproc_data(subject,study_dir)?;
                self.get_diffusion_preproc_data(subject,study_dir)
            }
            false => {
                self.get_diffusion_preproc_data(subject,study_dir)?;
                self.get_structural_preproc_data(subject,study_dir)
            }
        }
    }

    pub fn get_multirunicafix_prereqs(&self,subject:&SubjectInfo,study_dir:&Path) -> Result<()> {
        match self.copy {
            true => {
                self.get_unproc_data(subject,study_dir)?;
                self.get_preproc_data(subject,study_dir)
            }
            false => {
                self.get_preproc_data(subject,study_dir)?;
                self.get_unproc_data(subject,study_dir)
            }
        }
    }

    pub fn get_data_through_icafix(&self,subject:&SubjectInfo,study_dir:&Path) -> Result<()> {
        match self.copy {
            true => {
                self.get_unproc_data(subject,study_dir)?;
                self.get_preproc_data(subject,study_dir)?;
                self.get_icafix_data(subject,study_dir)
            }
            false => {
                self.get_icafix_data(subject,study_dir)?;
                self.get_preproc_data(subject,study_dir)?;
                self.get_unproc_data(subject,study_dir)
            }
        }
    }

    pub fn get_full_data(&self,subject:&SubjectInfo,study_dir:&Path) -> Result<()> {
        match self.copy {
            true => {
                self.get_data_through_icafix(subject,study_dir)?;
                self.get_resting_state_stats_data(subject,study_dir)
            }
            false => {
                self.get_resting_state_stats_data(subject,study_dir)?;
                self.get_data_through_icafix(subject,study_dir)
            }
        }
    }

    /// retrieve the data of one phase, removing XNAT bookkeeping where the phase calls for it
    pub fn get_phase_data(&self,phase:Phase,subject:&SubjectInfo,study_dir:&Path) -> Result<()> {
        tracing::info!("retrieving {} data for {} into {:?} ({})",phase,subject,study_dir,if self.copy { "copy" } else { "link" });
        match phase {
            Phase::Full => {
                self.get_full_data(subject,study_dir)?;
                clean_xnat_specific_files(study_dir)?;
            }
            Phase::DiffusionPreprocVetting => {
                self.get_diffusion_preproc_vetting_data(subject,study_dir)?;
                clean_xnat_specific_files(study_dir)?;
            }
            Phase::MultiRunIcaFixPrereqs => self.get_multirunicafix_prereqs(subject,study_dir)?,
            Phase::IcaFix => self.get_data_through_icafix(subject,study_dir)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archive::{ArchiveSettings, Hcp7TArchive};

    fn touch(p:&Path) {
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p,p.display().to_string()).unwrap();
    }

    #[test]
    fn links_never_replace_existing_files(){
        let dir = tempfile::tempdir().unwrap();
        let newer = dir.path().join("newer");
        let older = dir.path().join("older");
        touch(&newer.join("MNINonLinear/a.nii.gz"));
        touch(&older.join("MNINonLinear/a.nii.gz"));
        touch(&older.join("MNINonLinear/b.nii.gz"));
        let study = dir.path().join("study");
        assert_eq!(link_tree(&newer,&study).unwrap(),1);
        assert_eq!(link_tree(&older,&study).unwrap(),1);
        let a = fs::read_link(study.join("MNINonLinear/a.nii.gz")).unwrap();
        assert!(a.starts_with(&newer));
        let b = fs::read_link(study.join("MNINonLinear/b.nii.gz")).unwrap();
        assert!(b.starts_with(&older));
    }

    #[test]
    fn cleans_bookkeeping_and_top_level_files(){
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("102311/T1w/T1w_catalog.xml"));
        touch(&dir.path().join("102311/T1w/T1w.nii.gz"));
        touch(&dir.path().join("102311/T1w/Structural_Provenance.xml"));
        touch(&dir.path().join("stray.log"));
        assert_eq!(clean_xnat_specific_files(dir.path()).unwrap(),2);
        remove_non_subdirs(dir.path()).unwrap();
        assert!(!dir.path().join("stray.log").exists());
        assert!(dir.path().join("102311/T1w/T1w.nii.gz").exists());
    }

    #[test]
    fn icafix_phase_links_7t_tree(){
        let dir = tempfile::tempdir().unwrap();
        let settings = ArchiveSettings::new(&dir.path().join("archive"),&dir.path().join("build"));
        let a = Hcp7TArchive::new(settings);
        let s = SubjectInfo::new("HCP_Staging_7T","102311").with_reference_project("HCP_1200");
        let resources = a.subject_resources_dir(&s).unwrap();
        touch(&resources.join("rfMRI_REST1_PA_unproc/102311_7T_rfMRI_REST1_PA.nii.gz"));
        touch(&resources.join("rfMRI_REST1_PA_preproc/102311/MNINonLinear/Results/rfMRI_REST1_7T_PA/rfMRI_REST1_7T_PA.nii.gz"));
        touch(&resources.join("rfMRI_REST1_PA_FIX/rfMRI_REST1_7T_PA/rfMRI_REST1_7T_PA_hp2000.ica/mask.nii.gz"));

        let study = dir.path().join("study");
        let r = CinabStyleDataRetriever::new(&a);
        r.get_phase_data(Phase::IcaFix,&s,&study).unwrap();

        assert!(study.join("102311/unprocessed/7T/rfMRI_REST1_PA/102311_7T_rfMRI_REST1_PA.nii.gz").exists());
        assert!(study.join("102311/MNINonLinear/Results/rfMRI_REST1_7T_PA/rfMRI_REST1_7T_PA.nii.gz").exists());
        assert!(study.join("102311/rfMRI_REST1_7T_PA/rfMRI_REST1_7T_PA_hp2000.ica/mask.nii.gz").exists());
    }
}
