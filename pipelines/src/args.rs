use std::path::PathBuf;
use clap::ValueEnum;
use archive::subject::DEFAULT_SEPARATOR;
use crate::cinab::Phase;
use crate::pipeline::PipelineKind;

#[derive(clap::Parser,Debug)]
#[command(name = "xnat_pbs_jobs")]
pub struct XnatPbsJobsArgs {
    #[command(subcommand)]
    pub action: Action,
}

#[derive(clap::Subcommand,Debug)]
pub enum Action {
    /// submit pipeline jobs for every subject in a subject list
    SubmitBatch(SubmitBatchArgs),
    /// submit pipeline jobs for a single subject
    SubmitOne(SubmitOneArgs),
    /// check whether a pipeline produced all of its expected files. Exits 0 when it did, 1 otherwise
    CheckCompletion(CheckCompletionArgs),
    /// copy or link a subject's archived data into a CinaB style study directory
    GetCinabData(GetCinabDataArgs),
    /// tab separated report on the diffusion preprocessing packages of the listed subjects
    DiffusionPackageReport(ReportArgs),
    /// list queued and running jobs of a pipeline for the listed subjects
    Status(StatusArgs),
    /// create a new batch configuration template to modify for a new batch
    NewConfigTemplate(TemplateConfigArgs),
}

#[derive(Clone,Copy,Debug,PartialEq,Eq,ValueEnum)]
pub enum Tesla {
    #[value(name = "3T")]
    ThreeT,
    #[value(name = "7T")]
    SevenT,
}

#[derive(Clone,clap::Args,Debug)]
pub struct SubmitBatchArgs {
    pub pipeline:PipelineKind,
    /// one subject per line
    pub subject_file:PathBuf,
    /// batch configuration with per subject sections
    pub config:PathBuf,
    /// field separator of the subject file
    #[clap(long,default_value_t = DEFAULT_SEPARATOR)]
    pub separator:char,
    /// only submit jobs for units that are not already complete
    #[clap(long)]
    pub incomplete_only:bool,
    /// seconds to wait between submissions (defaults to 5)
    #[clap(long)]
    pub delay_seconds:Option<u64>,
}

#[derive(Clone,clap::Args,Debug)]
pub struct SubmitOneArgs {
    pub pipeline:PipelineKind,
    /// batch configuration with per subject sections
    pub config:PathBuf,
    #[clap(short,long)]
    pub project:String,
    #[clap(short,long)]
    pub subject:String,
    #[clap(short,long)]
    pub classifier:Option<String>,
    /// structural reference project of a 7T subject
    #[clap(short,long)]
    pub reference_project:Option<String>,
    /// submit for this scan only
    #[clap(short = 'n',long)]
    pub scan:Option<String>,
    #[clap(long)]
    pub incomplete_only:bool,
    #[clap(long)]
    pub delay_seconds:Option<u64>,
}

#[derive(Clone,clap::Args,Debug)]
pub struct CheckCompletionArgs {
    pub pipeline:PipelineKind,
    #[clap(short,long)]
    pub project:String,
    #[clap(short,long)]
    pub subject:String,
    #[clap(short,long)]
    pub classifier:Option<String>,
    #[clap(short = 'n',long)]
    pub scan:Option<String>,
    #[clap(short,long)]
    pub reference_project:Option<String>,
    /// report every file as it is checked
    #[clap(short,long)]
    pub verbose:bool,
    /// write the check report to this file instead of stdout
    #[clap(short,long)]
    pub output:Option<PathBuf>,
    /// report every missing file rather than stopping at the first
    #[clap(short = 'a',long)]
    pub check_all:bool,
    /// also require the completion marker to be newer than the inputs
    #[clap(long)]
    pub marked:bool,
}

#[derive(Clone,clap::Args,Debug)]
pub struct GetCinabDataArgs {
    #[clap(short,long)]
    pub project:String,
    #[clap(short,long)]
    pub subject:String,
    #[clap(short = 'd',long)]
    pub study_dir:PathBuf,
    /// rsync the data instead of linking to it
    #[clap(short,long)]
    pub copy:bool,
    /// log each retrieval
    #[clap(short,long)]
    pub log:bool,
    /// remove any non directory entries at the study directory level
    #[clap(short,long)]
    pub remove_non_subdirs:bool,
    #[clap(long,value_enum,ignore_case = true,default_value = "FULL")]
    pub phase:Phase,
    #[clap(long,value_enum,default_value = "7T")]
    pub tesla:Tesla,
    /// structural reference project of a 7T subject
    #[clap(long)]
    pub reference_project:Option<String>,
    /// session classifier, selects the CCF archive layout
    #[clap(long)]
    pub classifier:Option<String>,
}

#[derive(Clone,clap::Args,Debug)]
pub struct ReportArgs {
    pub subject_file:PathBuf,
    #[clap(long,default_value_t = DEFAULT_SEPARATOR)]
    pub separator:char,
}

#[derive(Clone,clap::Args,Debug)]
pub struct StatusArgs {
    pub pipeline:PipelineKind,
    pub subject_file:PathBuf,
    #[clap(long,default_value_t = DEFAULT_SEPARATOR)]
    pub separator:char,
}

#[derive(Clone,clap::Args,Debug)]
pub struct TemplateConfigArgs {
    /// path to the new config. The extension is replaced with .toml
    pub output_config:PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parses_completion_check(){
        let a = XnatPbsJobsArgs::try_parse_from([
            "xnat_pbs_jobs","check-completion","IcaFixProcessingHCP7T",
            "-p","HCP_Staging_7T","-s","102311","-r","HCP_1200","-n","rfMRI_REST1_PA","-a",
        ]).unwrap();
        match a.action {
            Action::CheckCompletion(c) => {
                assert_eq!(c.pipeline,PipelineKind::IcaFixProcessingHcp7T);
                assert_eq!(c.reference_project.as_deref(),Some("HCP_1200"));
                assert_eq!(c.scan.as_deref(),Some("rfMRI_REST1_PA"));
                assert!(c.check_all);
                assert!(!c.verbose);
            }
            other => panic!("unexpected action {:?}",other)
        }
    }

    #[test]
    fn phase_is_case_insensitive(){
        let a = XnatPbsJobsArgs::try_parse_from([
            "xnat_pbs_jobs","get-cinab-data","-p","HCP_Staging_7T","-s","102311",
            "-d","/tmp/study","--phase","icafix","-c",
        ]).unwrap();
        match a.action {
            Action::GetCinabData(g) => {
                assert_eq!(g.phase,Phase::IcaFix);
                assert_eq!(g.tesla,Tesla::SevenT);
                assert!(g.copy);
            }
            other => panic!("unexpected action {:?}",other)
        }
    }

    #[test]
    fn generated_get_data_flags_parse(){
        let a = XnatPbsJobsArgs::try_parse_from([
            "xnat_pbs_jobs","get-cinab-data","--project=CCF_HCA_STG","--subject=HCA6002236",
            "--classifier=V1_MR","--tesla=3T","--study-dir=/build/wd","--phase=FULL","--copy",
        ]).unwrap();
        assert!(matches!(a.action,Action::GetCinabData(GetCinabDataArgs { tesla:Tesla::ThreeT, .. })));
    }
}
