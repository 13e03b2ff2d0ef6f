use std::path::{Path, PathBuf};
use crate::error::{ArchiveError, Result};
use crate::resource::*;
use crate::scan_name::{self, FunctionalScanName, NAME_DELIMITER};
use crate::subject::SubjectInfo;

pub const ARCHIVE_ROOT_VAR:&str = "XNAT_PBS_JOBS_ARCHIVE_ROOT";
pub const BUILD_DIR_VAR:&str = "XNAT_PBS_JOBS_BUILD_DIR";

pub const ARCHIVE_SUBDIR:&str = "arc001";
pub const RESOURCES_DIR_NAME:&str = "RESOURCES";

pub const TESLA_SPEC_3T:&str = "3T";
pub const TESLA_SPEC_7T:&str = "7T";

#[derive(Clone,Debug,PartialEq,Eq)]
pub struct ArchiveSettings {
    /// root of the XNAT archive, e.g. /HCP/hcpdb/archive
    pub archive_root:PathBuf,
    /// where working directories for submitted jobs are built
    pub build_home:PathBuf,
}

impl ArchiveSettings {
    pub fn new(archive_root:&Path,build_home:&Path) -> Self {
        Self {
            archive_root:archive_root.to_owned(),
            build_home:build_home.to_owned(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let archive_root = utils::getenv_required(ARCHIVE_ROOT_VAR)?;
        let build_home = utils::getenv_required(BUILD_DIR_VAR)?;
        Ok(Self::new(Path::new(&archive_root),Path::new(&build_home)))
    }
}

/// File-system view of a project archive.
///
/// Path builders are pure string concatenation over the settings and the subject; only the
/// `available_*` and `*_exists` methods touch the file system.
pub trait Archive {
    fn settings(&self) -> &ArchiveSettings;

    /// scanner field strength token used in session and scan names
    fn tesla_spec(&self) -> &str;

    fn session_name(&self,subject:&SubjectInfo) -> Result<String>;

    /// project and session holding the subject's structural data
    fn structural_session(&self,subject:&SubjectInfo) -> Result<(String,String)> {
        Ok((subject.project.clone(),self.session_name(subject)?))
    }

    fn build_home(&self) -> &Path {
        &self.settings().build_home
    }

    fn project_archive_root(&self,project:&str) -> PathBuf {
        self.settings().archive_root.join(project).join(ARCHIVE_SUBDIR)
    }

    fn session_dir(&self,subject:&SubjectInfo) -> Result<PathBuf> {
        Ok(self.project_archive_root(&subject.project).join(self.session_name(subject)?))
    }

    fn subject_resources_dir(&self,subject:&SubjectInfo) -> Result<PathBuf> {
        Ok(self.session_dir(subject)?.join(RESOURCES_DIR_NAME))
    }

    fn structural_resources_dir(&self,subject:&SubjectInfo) -> Result<PathBuf> {
        let (project,session) = self.structural_session(subject)?;
        Ok(self.project_archive_root(&project).join(session).join(RESOURCES_DIR_NAME))
    }

    fn resource_dir(&self,subject:&SubjectInfo,resource:&Resource) -> Result<PathBuf> {
        let base = match resource.is_structural() {
            true => self.structural_resources_dir(subject)?,
            false => self.subject_resources_dir(subject)?,
        };
        Ok(base.join(resource.name()))
    }

    fn resource_exists(&self,subject:&SubjectInfo,resource:&Resource) -> Result<bool> {
        Ok(self.resource_dir(subject,resource)?.is_dir())
    }

    /// The 'long form' of a functional scan name, used as the fMRIName by the pipelines.
    /// rfMRI_REST3_PA becomes rfMRI_REST3_7T_PA for a 7T archive.
    fn functional_scan_long_name(&self,scan:&str) -> Result<String> {
        let s:FunctionalScanName = scan.parse()?;
        Ok(s.long_name(self.tesla_spec()).to_string())
    }

    fn is_resting_state_scan_name(&self,scan:&str) -> bool {
        scan.contains(RESTING_STATE_SCAN_MARKER)
    }

    fn is_task_scan_name(&self,scan:&str) -> bool {
        scan.contains(TASK_SCAN_MARKER)
    }

    fn is_movie_scan_name(&self,scan:&str) -> bool {
        self.is_task_scan_name(scan) && scan.contains("MOVIE")
    }

    fn available_resource_dirs(&self,subject:&SubjectInfo,pattern:&str) -> Result<Vec<PathBuf>> {
        let dir = self.subject_resources_dir(subject)?;
        Ok(utils::get_all_matches(&dir,pattern).unwrap_or_default())
    }

    fn available_scan_names(&self,subject:&SubjectInfo,pattern:&str,suffix:&str) -> Result<Vec<String>> {
        Ok(self.available_resource_dirs(subject,pattern)?.iter()
            .flat_map(|d| d.file_name().and_then(|n| n.to_str()).and_then(|n| scan_name::scan_name_from_resource_dir(n,suffix)))
            .collect())
    }

    fn available_functional_unproc_dirs(&self,subject:&SubjectInfo) -> Result<Vec<PathBuf>> {
        self.available_resource_dirs(subject,&format!("*{}*{}{}",FUNCTIONAL_SCAN_MARKER,NAME_DELIMITER,UNPROC_SUFFIX))
    }

    fn available_functional_unproc_names(&self,subject:&SubjectInfo) -> Result<Vec<String>> {
        self.available_scan_names(subject,&format!("*{}*{}{}",FUNCTIONAL_SCAN_MARKER,NAME_DELIMITER,UNPROC_SUFFIX),UNPROC_SUFFIX)
    }

    fn available_functional_preproc_dirs(&self,subject:&SubjectInfo) -> Result<Vec<PathBuf>> {
        self.available_resource_dirs(subject,&format!("*{}*{}{}",FUNCTIONAL_SCAN_MARKER,NAME_DELIMITER,PREPROC_SUFFIX))
    }

    fn available_functional_preproc_names(&self,subject:&SubjectInfo) -> Result<Vec<String>> {
        self.available_scan_names(subject,&format!("*{}*{}{}",FUNCTIONAL_SCAN_MARKER,NAME_DELIMITER,PREPROC_SUFFIX),PREPROC_SUFFIX)
    }

    fn available_resting_state_preproc_names(&self,subject:&SubjectInfo) -> Result<Vec<String>> {
        self.available_scan_names(subject,&format!("*{}*{}",RESTING_STATE_SCAN_MARKER,PREPROC_SUFFIX),PREPROC_SUFFIX)
    }

    fn available_task_preproc_names(&self,subject:&SubjectInfo) -> Result<Vec<String>> {
        self.available_scan_names(subject,&format!("*{}*{}",TASK_SCAN_MARKER,PREPROC_SUFFIX),PREPROC_SUFFIX)
    }

    fn available_movie_preproc_names(&self,subject:&SubjectInfo) -> Result<Vec<String>> {
        self.available_scan_names(subject,&format!("*{}*MOVIE*{}",TASK_SCAN_MARKER,PREPROC_SUFFIX),PREPROC_SUFFIX)
    }

    fn available_retinotopy_preproc_names(&self,subject:&SubjectInfo) -> Result<Vec<String>> {
        self.available_scan_names(subject,&format!("*{}*RET*{}",TASK_SCAN_MARKER,PREPROC_SUFFIX),PREPROC_SUFFIX)
    }

    fn available_fix_processed_dirs(&self,subject:&SubjectInfo) -> Result<Vec<PathBuf>> {
        self.available_resource_dirs(subject,&format!("*{}*{}{}",FUNCTIONAL_SCAN_MARKER,NAME_DELIMITER,FIX_PROCESSED_SUFFIX))
    }

    fn available_fix_processed_names(&self,subject:&SubjectInfo) -> Result<Vec<String>> {
        self.available_scan_names(subject,&format!("*{}*{}{}",FUNCTIONAL_SCAN_MARKER,NAME_DELIMITER,FIX_PROCESSED_SUFFIX),FIX_PROCESSED_SUFFIX)
    }

    fn available_rss_processed_dirs(&self,subject:&SubjectInfo) -> Result<Vec<PathBuf>> {
        self.available_resource_dirs(subject,&format!("*{}*{}{}",RESTING_STATE_SCAN_MARKER,NAME_DELIMITER,RSS_PROCESSED_SUFFIX))
    }

    fn available_diffusion_unproc_dirs(&self,subject:&SubjectInfo) -> Result<Vec<PathBuf>> {
        self.available_resource_dirs(subject,&format!("*{}*{}",DIFFUSION_SCAN_MARKER,UNPROC_SUFFIX))
    }

    fn available_diffusion_preproc_dirs(&self,subject:&SubjectInfo) -> Result<Vec<PathBuf>> {
        self.available_resource_dirs(subject,&format!("*{}*{}",DIFFUSION_SCAN_MARKER,PREPROC_SUFFIX))
    }

    fn does_diffusion_unproc_dir_exist(&self,subject:&SubjectInfo) -> Result<bool> {
        Ok(!self.available_diffusion_unproc_dirs(subject)?.is_empty())
    }

    fn available_structural_unproc_dirs(&self,subject:&SubjectInfo) -> Result<Vec<PathBuf>> {
        let dir = self.structural_resources_dir(subject)?;
        let mut dirs:Vec<PathBuf> = STRUCTURAL_SCAN_MARKERS.iter()
            .flat_map(|marker| utils::get_all_matches(&dir,&format!("{}*{}{}",marker,NAME_DELIMITER,UNPROC_SUFFIX)).unwrap_or_default())
            .collect();
        dirs.sort();
        Ok(dirs)
    }

    fn available_structural_preproc_dirs(&self,subject:&SubjectInfo) -> Result<Vec<PathBuf>> {
        let dir = self.resource_dir(subject,&Resource::StructuralPreproc)?;
        Ok(match dir.is_dir() { true => vec![dir], false => vec![] })
    }

    fn available_supplemental_structural_preproc_dirs(&self,subject:&SubjectInfo) -> Result<Vec<PathBuf>> {
        let dir = self.resource_dir(subject,&Resource::SupplementalStructuralPreproc)?;
        Ok(match dir.is_dir() { true => vec![dir], false => vec![] })
    }

    fn available_session_dirs(&self,project:&str) -> Vec<PathBuf> {
        utils::get_all_matches(&self.project_archive_root(project),"*").unwrap_or_default()
            .into_iter().filter(|p| p.is_dir()).collect()
    }

    fn available_session_names(&self,project:&str) -> Vec<String> {
        self.available_session_dirs(project).iter()
            .flat_map(|d| d.file_name().and_then(|n| n.to_str()).map(|n| n.to_string()))
            .collect()
    }

    fn available_subject_ids(&self,project:&str) -> Vec<String> {
        let mut ids:Vec<String> = self.available_session_names(project).iter()
            .flat_map(|session| session.split(NAME_DELIMITER).next().map(|s| s.to_string()))
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    fn subject_count(&self,project:&str) -> usize {
        self.available_subject_ids(project).len()
    }
}

/// HCP 3T project archive
#[derive(Clone,Debug)]
pub struct Hcp3TArchive {
    settings:ArchiveSettings,
}

impl Hcp3TArchive {
    pub fn new(settings:ArchiveSettings) -> Self {
        Self { settings }
    }
}

impl Archive for Hcp3TArchive {
    fn settings(&self) -> &ArchiveSettings {
        &self.settings
    }
    fn tesla_spec(&self) -> &str {
        TESLA_SPEC_3T
    }
    fn session_name(&self,subject:&SubjectInfo) -> Result<String> {
        Ok(format!("{}{}{}",subject.subject_id,NAME_DELIMITER,TESLA_SPEC_3T))
    }
}

/// HCP 7T project archive. Structural data for 7T subjects is found in the 3T session
/// of the subject's structural reference project.
#[derive(Clone,Debug)]
pub struct Hcp7TArchive {
    settings:ArchiveSettings,
}

impl Hcp7TArchive {
    pub fn new(settings:ArchiveSettings) -> Self {
        Self { settings }
    }
}

impl Archive for Hcp7TArchive {
    fn settings(&self) -> &ArchiveSettings {
        &self.settings
    }
    fn tesla_spec(&self) -> &str {
        TESLA_SPEC_7T
    }
    fn session_name(&self,subject:&SubjectInfo) -> Result<String> {
        Ok(format!("{}{}{}",subject.subject_id,NAME_DELIMITER,TESLA_SPEC_7T))
    }
    fn structural_session(&self,subject:&SubjectInfo) -> Result<(String,String)> {
        let reference = subject.structural_reference_project.clone()
            .ok_or_else(|| ArchiveError::MissingReferenceProject(subject.subject_id.clone()))?;
        Ok((reference,format!("{}{}{}",subject.subject_id,NAME_DELIMITER,TESLA_SPEC_3T)))
    }
}

/// Connectome Coordination Facility archive. Sessions are named by subject and classifier
/// (e.g. HCA6002236_V1_MR) and scan names are used as they appear in the archive.
/// Every CCF session is acquired at 3T.
#[derive(Clone,Debug)]
pub struct CcfArchive {
    settings:ArchiveSettings,
}

impl CcfArchive {
    pub fn new(settings:ArchiveSettings) -> Self {
        Self { settings }
    }
}

impl Archive for CcfArchive {
    fn settings(&self) -> &ArchiveSettings {
        &self.settings
    }
    fn tesla_spec(&self) -> &str {
        TESLA_SPEC_3T
    }
    fn session_name(&self,subject:&SubjectInfo) -> Result<String> {
        let classifier = subject.classifier.as_ref()
            .ok_or_else(|| ArchiveError::MissingClassifier(subject.subject_id.clone()))?;
        Ok(format!("{}{}{}",subject.subject_id,NAME_DELIMITER,classifier))
    }
    fn functional_scan_long_name(&self,scan:&str) -> Result<String> {
        let s:FunctionalScanName = scan.parse()?;
        Ok(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ArchiveSettings {
        ArchiveSettings::new(Path::new("/HCP/hcpdb/archive"),Path::new("/HCP/hcpdb/build_ssd/chpc/BUILD"))
    }

    #[test]
    fn hcp7t_paths(){
        let a = Hcp7TArchive::new(settings());
        let s = SubjectInfo::new("HCP_Staging_7T","102311").with_reference_project("HCP_500");
        assert_eq!(a.session_name(&s).unwrap(),"102311_7T");
        assert_eq!(
            a.subject_resources_dir(&s).unwrap(),
            PathBuf::from("/HCP/hcpdb/archive/HCP_Staging_7T/arc001/102311_7T/RESOURCES")
        );
        assert_eq!(
            a.resource_dir(&s,&Resource::FixProcessed("rfMRI_REST1_PA".into())).unwrap(),
            PathBuf::from("/HCP/hcpdb/archive/HCP_Staging_7T/arc001/102311_7T/RESOURCES/rfMRI_REST1_PA_FIX")
        );
        assert_eq!(
            a.resource_dir(&s,&Resource::StructuralPreproc).unwrap(),
            PathBuf::from("/HCP/hcpdb/archive/HCP_500/arc001/102311_3T/RESOURCES/Structural_preproc")
        );
        assert_eq!(a.functional_scan_long_name("rfMRI_REST3_PA").unwrap(),"rfMRI_REST3_7T_PA");
    }

    #[test]
    fn hcp7t_structural_needs_reference_project(){
        let a = Hcp7TArchive::new(settings());
        let s = SubjectInfo::new("HCP_Staging_7T","102311");
        assert!(matches!(a.resource_dir(&s,&Resource::StructuralPreproc),Err(ArchiveError::MissingReferenceProject(_))));
        assert!(a.resource_dir(&s,&Resource::DiffusionPreproc).is_ok());
    }

    #[test]
    fn ccf_session_uses_classifier(){
        let a = CcfArchive::new(settings());
        let s = SubjectInfo::new("CCF_HCA_STG","HCA6002236").with_classifier("V1_MR");
        assert_eq!(a.session_name(&s).unwrap(),"HCA6002236_V1_MR");
        assert_eq!(a.tesla_spec(),"3T");
        assert_eq!(a.functional_scan_long_name("rfMRI_REST1_AP").unwrap(),"rfMRI_REST1_AP");
        assert!(a.functional_scan_long_name("rfMRI_REST1").is_err());
        let unclassified = SubjectInfo::new("CCF_HCA_STG","HCA6002236");
        assert!(matches!(a.session_dir(&unclassified),Err(ArchiveError::MissingClassifier(_))));
    }

    #[test]
    fn resolver_is_pure(){
        let a = Hcp3TArchive::new(settings());
        let s = SubjectInfo::new("HCP_500","100307");
        let first = a.resource_dir(&s,&Resource::FunctionalPreproc("rfMRI_REST1_LR".into())).unwrap();
        for _ in 0..3 {
            assert_eq!(a.resource_dir(&s,&Resource::FunctionalPreproc("rfMRI_REST1_LR".into())).unwrap(),first);
        }
        assert_eq!(first,PathBuf::from("/HCP/hcpdb/archive/HCP_500/arc001/100307_3T/RESOURCES/rfMRI_REST1_LR_preproc"));
    }
}
