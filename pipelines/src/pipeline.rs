use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use clap::ValueEnum;
use archive::{Archive, ArchiveSettings, CcfArchive, CompletionChecker, Hcp7TArchive, SubjectInfo, SubjectListLayout};
use archive::completion::{DiffusionPreprocessing7TChecker, FunctionalPreprocessingChecker, IcaFix7TChecker};
use archive::resource::{DIFFUSION_SCAN_MARKER, FIX_PROCESSED_SUFFIX};
use crate::cinab::Phase;

/// How far the chain of jobs for one unit of work is taken
#[derive(Clone,Copy,Debug,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub enum ProcessingStage {
    PrepareScripts,
    GetData,
    ProcessData,
    CleanData,
    PutData,
}

impl ProcessingStage {
    pub const ALL:[ProcessingStage;5] = [
        ProcessingStage::PrepareScripts,
        ProcessingStage::GetData,
        ProcessingStage::ProcessData,
        ProcessingStage::CleanData,
        ProcessingStage::PutData,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStage::PrepareScripts => "PREPARE_SCRIPTS",
            ProcessingStage::GetData => "GET_DATA",
            ProcessingStage::ProcessData => "PROCESS_DATA",
            ProcessingStage::CleanData => "CLEAN_DATA",
            ProcessingStage::PutData => "PUT_DATA",
        }
    }

    /// stages that have a job submitted when processing is taken up to `self`
    pub fn submitted_stages(&self) -> Vec<ProcessingStage> {
        Self::ALL.iter().copied()
            .filter(|s| *s >= ProcessingStage::GetData && s <= self)
            .collect()
    }
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,"{}",self.as_str())
    }
}

impl FromStr for ProcessingStage {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Self::ALL.iter().copied()
            .find(|stage| stage.as_str() == upper)
            .ok_or_else(|| format!("unknown processing stage: {}",s))
    }
}

/// The pipelines jobs can be submitted for
#[derive(Clone,Copy,Debug,PartialEq,Eq,Hash,ValueEnum)]
pub enum PipelineKind {
    #[value(name = "FunctionalPreprocessing")]
    FunctionalPreprocessing,
    #[value(name = "IcaFixProcessingHCP7T")]
    IcaFixProcessingHcp7T,
    #[value(name = "MultiRunIcaFixProcessingHCP7T")]
    MultiRunIcaFixProcessingHcp7T,
    #[value(name = "DiffusionPreprocessingHCP7T")]
    DiffusionPreprocessingHcp7T,
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,"{}",self.name())
    }
}

impl PipelineKind {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineKind::FunctionalPreprocessing => "FunctionalPreprocessing",
            PipelineKind::IcaFixProcessingHcp7T => "IcaFixProcessingHCP7T",
            PipelineKind::MultiRunIcaFixProcessingHcp7T => "MultiRunIcaFixProcessingHCP7T",
            PipelineKind::DiffusionPreprocessingHcp7T => "DiffusionPreprocessingHCP7T",
        }
    }

    /// one chain of jobs per scan rather than per subject
    pub fn per_scan(&self) -> bool {
        matches!(self,PipelineKind::FunctionalPreprocessing | PipelineKind::IcaFixProcessingHcp7T)
    }

    pub fn is_7t(&self) -> bool {
        !matches!(self,PipelineKind::FunctionalPreprocessing)
    }

    pub fn subject_list_layout(&self) -> SubjectListLayout {
        match self.is_7t() {
            true => SubjectListLayout::Hcp7T,
            false => SubjectListLayout::Ccf
        }
    }

    pub fn archive(&self,settings:ArchiveSettings) -> Box<dyn Archive> {
        match self.is_7t() {
            true => Box::new(Hcp7TArchive::new(settings)),
            false => Box::new(CcfArchive::new(settings))
        }
    }

    /// host name prefix of the shadow servers receiving put jobs
    pub fn shadow_host_prefix(&self) -> &'static str {
        match self.is_7t() {
            true => "db-shadow",
            false => "intradb-shadow"
        }
    }

    pub fn checker(&self) -> Option<Box<dyn CompletionChecker>> {
        match self {
            PipelineKind::FunctionalPreprocessing => Some(Box::new(FunctionalPreprocessingChecker)),
            PipelineKind::IcaFixProcessingHcp7T => Some(Box::new(IcaFix7TChecker)),
            PipelineKind::DiffusionPreprocessingHcp7T => Some(Box::new(DiffusionPreprocessing7TChecker)),
            PipelineKind::MultiRunIcaFixProcessingHcp7T => None,
        }
    }

    /// data retrieval phase run by the get data job
    pub fn data_phase(&self) -> Phase {
        match self {
            PipelineKind::FunctionalPreprocessing => Phase::Full,
            PipelineKind::IcaFixProcessingHcp7T => Phase::IcaFix,
            PipelineKind::MultiRunIcaFixProcessingHcp7T => Phase::MultiRunIcaFixPrereqs,
            PipelineKind::DiffusionPreprocessingHcp7T => Phase::DiffusionPreprocVetting,
        }
    }

    /// directory of the pipeline launch scripts under the pipelines home
    pub fn script_dir(&self,pipelines_home:&Path) -> PathBuf {
        match self.is_7t() {
            true => pipelines_home.join("7T").join(self.name()),
            false => pipelines_home.join(self.name())
        }
    }

    pub fn process_script(&self,pipelines_home:&Path) -> PathBuf {
        self.script_dir(pipelines_home).join(format!("{}.XNAT.sh",self.name()))
    }

    /// shared script that puts a working directory back into the archive
    pub fn put_script(pipelines_home:&Path) -> PathBuf {
        pipelines_home.join("WorkingDirPut").join("XNAT_working_dir_put.sh")
    }

    /// Scans to submit for when the subject names none. Empty for per subject pipelines.
    pub fn default_scans(&self,archive:&dyn Archive,subject:&SubjectInfo) -> archive::Result<Vec<String>> {
        match self {
            PipelineKind::FunctionalPreprocessing => archive.available_functional_unproc_names(subject),
            PipelineKind::IcaFixProcessingHcp7T => {
                let mut scans = archive.available_resting_state_preproc_names(subject)?;
                tracing::info!("preprocessed resting state scans available for {}: {:?}",subject.subject_id,scans);
                let movies = archive.available_movie_preproc_names(subject)?;
                tracing::info!("preprocessed movie scans available for {}: {:?}",subject.subject_id,movies);
                scans.extend(movies);
                Ok(scans)
            }
            _ => Ok(vec![])
        }
    }

    /// ICA+FIX output always goes to the scan's FIX resource
    pub fn output_resource_name(&self,scan:Option<&str>,suffix:&str) -> String {
        match (self,scan) {
            (PipelineKind::IcaFixProcessingHcp7T,Some(scan)) => format!("{}_{}",scan,FIX_PROCESSED_SUFFIX),
            (_,Some(scan)) => format!("{}_{}",scan,suffix),
            (PipelineKind::DiffusionPreprocessingHcp7T,None) => format!("{}_{}",DIFFUSION_SCAN_MARKER,suffix),
            (PipelineKind::MultiRunIcaFixProcessingHcp7T,None) => format!("MultiRunIcaFix_{}",suffix),
            (_,None) => format!("{}_{}",self.name(),suffix),
        }
    }

    /// reason recorded with the results when they are put back into the archive
    pub fn put_reason(&self,scan:Option<&str>) -> String {
        match scan {
            Some(scan) => format!("{}_{}",scan,self.name()),
            None => self.name().to_string()
        }
    }

    /// Whether a scheduler job name belongs to this pipeline and subject. Job names are the
    /// script file names, `<subject>[.<long scan>].<pipeline>.<project>.<session>.<kind>`.
    pub fn owns_job(&self,job_name:&str,subject:&SubjectInfo) -> bool {
        let mut parts = job_name.split('.');
        if parts.next() != Some(subject.subject_id.as_str()) {
            return false
        }
        let rest:Vec<&str> = parts.collect();
        match self.per_scan() {
            true => rest.get(1) == Some(&self.name()),
            false => rest.first() == Some(&self.name())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_parse_case_insensitively_and_order(){
        assert_eq!("process_data".parse::<ProcessingStage>().unwrap(),ProcessingStage::ProcessData);
        assert_eq!(" PUT_DATA ".parse::<ProcessingStage>().unwrap(),ProcessingStage::PutData);
        assert!("PUT".parse::<ProcessingStage>().is_err());
        assert!(ProcessingStage::PrepareScripts < ProcessingStage::GetData);
        assert!(ProcessingStage::CleanData < ProcessingStage::PutData);
    }

    #[test]
    fn submitted_stages_start_at_get_data(){
        assert!(ProcessingStage::PrepareScripts.submitted_stages().is_empty());
        assert_eq!(ProcessingStage::ProcessData.submitted_stages(),vec![ProcessingStage::GetData,ProcessingStage::ProcessData]);
        assert_eq!(ProcessingStage::PutData.submitted_stages().len(),4);
    }

    #[test]
    fn script_locations(){
        let home = Path::new("/home/HCPpipeline/pipeline_tools/xnat_pbs_jobs");
        assert_eq!(PipelineKind::IcaFixProcessingHcp7T.process_script(home),
            home.join("7T/IcaFixProcessingHCP7T/IcaFixProcessingHCP7T.XNAT.sh"));
        assert_eq!(PipelineKind::FunctionalPreprocessing.process_script(home),
            home.join("FunctionalPreprocessing/FunctionalPreprocessing.XNAT.sh"));
    }

    #[test]
    fn output_resources(){
        assert_eq!(PipelineKind::IcaFixProcessingHcp7T.output_resource_name(Some("rfMRI_REST1_PA"),"preproc"),"rfMRI_REST1_PA_FIX");
        assert_eq!(PipelineKind::FunctionalPreprocessing.output_resource_name(Some("rfMRI_REST1_AP"),"preproc"),"rfMRI_REST1_AP_preproc");
        assert_eq!(PipelineKind::DiffusionPreprocessingHcp7T.output_resource_name(None,"preproc"),"Diffusion_preproc");
        assert_eq!(PipelineKind::MultiRunIcaFixProcessingHcp7T.output_resource_name(None,"proc"),"MultiRunIcaFix_proc");
        assert_eq!(PipelineKind::IcaFixProcessingHcp7T.put_reason(Some("tfMRI_MOVIE1_AP")),"tfMRI_MOVIE1_AP_IcaFixProcessingHCP7T");
    }

    #[test]
    fn job_ownership(){
        let s = SubjectInfo::new("HCP_Staging_7T","102311").with_reference_project("HCP_1200");
        let ica = PipelineKind::IcaFixProcessingHcp7T;
        assert!(ica.owns_job("102311.rfMRI_REST1_7T_PA.IcaFixProcessingHCP7T.HCP_Staging_7T.102311_7T.XNAT_PBS_job.sh",&s));
        assert!(!ica.owns_job("1023110.rfMRI_REST1_7T_PA.IcaFixProcessingHCP7T.HCP_Staging_7T.1023110_7T.XNAT_PBS_job.sh",&s));
        assert!(!ica.owns_job("102311.DiffusionPreprocessingHCP7T.HCP_Staging_7T.102311_7T.XNAT_PBS_job.sh",&s));
        assert!(PipelineKind::DiffusionPreprocessingHcp7T.owns_job("102311.DiffusionPreprocessingHCP7T.HCP_Staging_7T.102311_7T.XNAT_PBS_PUT_job.sh",&s));
    }
}
