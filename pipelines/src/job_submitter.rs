use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use archive::{Archive, SubjectInfo};
use archive::archive::{ARCHIVE_ROOT_VAR, BUILD_DIR_VAR};
use archive::completion::{CheckOptions, PROCESSING_INFO_DIR_NAME};
use pbs::{BatchScript, JobId, PbsOpts, Scheduler, ScriptCommand};
use crate::config::{Environment, JobParameters};
use crate::credentials::Credentials;
use crate::error::{PipelineError, Result};
use crate::pipeline::{PipelineKind, ProcessingStage};

pub const GET_DATA_SCRIPT_SUFFIX:&str = ".XNAT_PBS_GET_job.sh";
pub const WORK_SCRIPT_SUFFIX:&str = ".XNAT_PBS_job.sh";
pub const CLEAN_SCRIPT_SUFFIX:&str = ".XNAT_PBS_CLEAN_job.sh";
pub const PUT_SCRIPT_SUFFIX:&str = ".XNAT_PBS_PUT_job.sh";

pub const DEFAULT_SUBMISSION_DELAY:Duration = Duration::from_secs(5);

const GET_DATA_WALLTIME_HOURS:u32 = 4;
const GET_DATA_VMEM_GBS:u32 = 4;
const CLEAN_WALLTIME_HOURS:u32 = 1;
const CLEAN_VMEM_GBS:u32 = 4;
const PUT_WALLTIME_HOURS:u32 = 4;
const PUT_VMEM_GBS:u32 = 12;

#[derive(Clone,Debug,PartialEq,Eq)]
pub struct SubmittedJob {
    pub stage:ProcessingStage,
    pub script:PathBuf,
    pub job_id:JobId,
}

impl fmt::Display for SubmittedJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,"{} {} ({})",self.stage,self.job_id,self.script.display())
    }
}

/// The scripts written and jobs submitted for one subject or subject scan
#[derive(Clone,Debug)]
pub struct UnitSubmission {
    pub scan:Option<String>,
    pub working_dir:PathBuf,
    pub scripts:Vec<(ProcessingStage,PathBuf)>,
    pub jobs:Vec<SubmittedJob>,
}

impl UnitSubmission {
    pub fn script(&self,stage:ProcessingStage) -> Option<&Path> {
        self.scripts.iter().find(|(s,_)| *s == stage).map(|(_,p)| p.as_path())
    }
}

/// Writes and submits the chain of jobs of one pipeline for one subject
pub struct OneSubjectJobSubmitter<'a> {
    pipeline:PipelineKind,
    archive:&'a dyn Archive,
    scheduler:&'a dyn Scheduler,
    credentials:&'a Credentials,
    xnat_server:String,
    pipelines_home:PathBuf,
    /// executable run by the get data job
    program:PathBuf,
    /// pause before each unit so working directory time stamps differ
    pub delay:Duration,
    /// skip units the completion checker already finds complete
    pub incomplete_only:bool,
}

impl<'a> OneSubjectJobSubmitter<'a> {
    pub fn new(pipeline:PipelineKind,archive:&'a dyn Archive,scheduler:&'a dyn Scheduler,credentials:&'a Credentials,env:&Environment,program:&Path) -> Self {
        Self {
            pipeline,
            archive,
            scheduler,
            credentials,
            xnat_server:env.xnat_server.clone(),
            pipelines_home:env.pipelines_home.clone(),
            program:program.to_owned(),
            delay:DEFAULT_SUBMISSION_DELAY,
            incomplete_only:false,
        }
    }

    pub fn pipeline(&self) -> PipelineKind {
        self.pipeline
    }

    /// scans named by the subject, or every scan the pipeline applies to
    fn units(&self,subject:&SubjectInfo) -> Result<Vec<Option<String>>> {
        if !self.pipeline.per_scan() {
            return Ok(vec![None])
        }
        Ok(match &subject.extra {
            Some(scan) => vec![Some(scan.clone())],
            None => self.pipeline.default_scans(self.archive,subject)?.into_iter().map(Some).collect()
        })
    }

    fn is_complete(&self,subject:&SubjectInfo) -> Result<bool> {
        match self.pipeline.checker() {
            Some(checker) => Ok(checker.is_processing_complete(self.archive,subject,CheckOptions::quick(),&mut io::sink())?),
            None => Ok(false)
        }
    }

    pub fn submit_jobs(&self,subject:&SubjectInfo,parameters:&JobParameters,put_server:&str) -> Result<Vec<UnitSubmission>> {
        let mut submissions = Vec::<UnitSubmission>::new();
        for scan in self.units(subject)? {
            let unit_subject = match &scan {
                Some(s) => subject.clone().with_extra(s),
                None => subject.clone()
            };
            if self.incomplete_only && self.is_complete(&unit_subject)? {
                tracing::info!("{} is already complete for {}, only submitting jobs for incomplete units",self.pipeline,unit_subject);
                continue
            }
            thread::sleep(self.delay);
            submissions.push(self.submit_unit(&unit_subject,scan.as_deref(),parameters,put_server)?);
        }
        Ok(submissions)
    }

    fn working_dir(&self,subject:&SubjectInfo,long_scan:Option<&str>) -> PathBuf {
        let mut name = format!("{}.{}",self.pipeline.name(),subject.subject_id);
        if let Some(scan) = long_scan {
            name.push_str(&format!(".{}",scan));
        }
        name.push_str(&format!(".{}",chrono::Utc::now().timestamp()));
        self.archive.build_home().join(&subject.project).join(name)
    }

    fn script_stem(&self,subject:&SubjectInfo,long_scan:Option<&str>,session:&str) -> String {
        let mut stem = subject.subject_id.clone();
        if let Some(scan) = long_scan {
            stem.push_str(&format!(".{}",scan));
        }
        format!("{}.{}.{}.{}",stem,self.pipeline.name(),subject.project,session)
    }

    fn starttime_marker(&self,subject:&SubjectInfo,working_dir:&Path) -> PathBuf {
        working_dir.join(PROCESSING_INFO_DIR_NAME).join(format!("{}.{}.starttime",subject.subject_id,self.pipeline.name()))
    }

    fn get_data_script(&self,subject:&SubjectInfo,working_dir:&Path) -> BatchScript {
        let mut opts = PbsOpts::new(GET_DATA_WALLTIME_HOURS).output_to(working_dir);
        opts.vmem_gb = Some(GET_DATA_VMEM_GBS);
        let mut script = BatchScript::new(opts);
        let settings = self.archive.settings();
        script.push_line(&format!("export {}={}",ARCHIVE_ROOT_VAR,pbs::script::shell_quote(&settings.archive_root.display().to_string())));
        script.push_line(&format!("export {}={}",BUILD_DIR_VAR,pbs::script::shell_quote(&settings.build_home.display().to_string())));
        let cmd = ScriptCommand::new(&self.program)
            .positional("get-cinab-data")
            .arg("--project",&subject.project)
            .arg("--subject",&subject.subject_id)
            .opt_arg("--reference-project",subject.structural_reference_project.as_ref())
            .opt_arg("--classifier",subject.classifier.as_ref())
            .arg("--tesla",self.archive.tesla_spec())
            .arg("--study-dir",working_dir.display())
            .arg("--phase",self.pipeline.data_phase())
            .flag("--copy");
        script.push(&cmd);
        script
    }

    fn work_script(&self,subject:&SubjectInfo,long_scan:Option<&str>,session:&str,working_dir:&Path,parameters:&JobParameters) -> Result<BatchScript> {
        let mut opts = PbsOpts::new(parameters.walltime_limit_hours).output_to(working_dir);
        opts.mem_gb = parameters.mem_limit_gbs;
        opts.vmem_gb = Some(parameters.vmem_limit_gbs);
        let mut script = BatchScript::new(opts);

        let marker = self.starttime_marker(subject,working_dir);
        if let Some(dir) = marker.parent() {
            script.push_line(&format!("mkdir -p {}",pbs::script::shell_quote(&dir.display().to_string())));
        }
        script.push_line(&format!("touch {}",pbs::script::shell_quote(&marker.display().to_string())));

        let reference = match &subject.structural_reference_project {
            Some(_) => Some(self.archive.structural_session(subject)?),
            None => None
        };
        let cmd = ScriptCommand::new(self.pipeline.process_script(&self.pipelines_home))
            .arg("--user",&self.credentials.username)
            .arg("--password",self.credentials.password())
            .arg("--server",&self.xnat_server)
            .arg("--project",&subject.project)
            .arg("--subject",&subject.subject_id)
            .arg("--session",session)
            .opt_arg("--classifier",subject.classifier.as_ref())
            .opt_arg("--structural-reference-project",reference.as_ref().map(|(p,_)| p))
            .opt_arg("--structural-reference-session",reference.as_ref().map(|(_,s)| s))
            .opt_arg("--scan",long_scan)
            .arg("--working-dir",working_dir.display())
            .opt_arg("--setup-script",parameters.setup_script.as_ref());
        script.push(&cmd);
        Ok(script)
    }

    fn clean_script(&self,subject:&SubjectInfo,working_dir:&Path) -> BatchScript {
        let mut opts = PbsOpts::new(CLEAN_WALLTIME_HOURS).output_to(working_dir);
        opts.vmem_gb = Some(CLEAN_VMEM_GBS);
        let mut script = BatchScript::new(opts);
        let marker = self.starttime_marker(subject,working_dir);
        let marker_name = marker.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        // retrieved inputs are exactly the files not newer than the start time marker
        script.push_line(&format!("find {} \\( -type f -o -type l \\) -not -newer {} -not -name {} -delete",
            pbs::script::shell_quote(&working_dir.display().to_string()),
            pbs::script::shell_quote(&marker.display().to_string()),
            pbs::script::shell_quote(&marker_name),
        ));
        script
    }

    fn put_script(&self,subject:&SubjectInfo,session:&str,scan:Option<&str>,working_dir:&Path,parameters:&JobParameters,put_server:&str) -> BatchScript {
        let mut opts = PbsOpts::new(PUT_WALLTIME_HOURS).output_to(working_dir);
        opts.vmem_gb = Some(PUT_VMEM_GBS);
        let mut script = BatchScript::new(opts);
        let mut cmd = ScriptCommand::new(PipelineKind::put_script(&self.pipelines_home))
            .arg("--user",&self.credentials.username)
            .arg("--password",self.credentials.password())
            .arg("--server",put_server)
            .arg("--project",&subject.project)
            .arg("--subject",&subject.subject_id)
            .arg("--session",session)
            .arg("--working-dir",working_dir.display())
            .arg("--resource-suffix",self.pipeline.output_resource_name(scan,&parameters.output_resource_suffix))
            .arg("--reason",self.pipeline.put_reason(scan));
        if parameters.clean_output_first {
            cmd = cmd.flag("--clean-output-resource-first");
        }
        script.push(&cmd);
        script
    }

    fn submit_unit(&self,subject:&SubjectInfo,scan:Option<&str>,parameters:&JobParameters,put_server:&str) -> Result<UnitSubmission> {
        let long_scan = match scan {
            Some(s) => Some(self.archive.functional_scan_long_name(s)?),
            None => None
        };
        let session = self.archive.session_name(subject)?;
        let output_resource = self.pipeline.output_resource_name(scan,&parameters.output_resource_suffix);

        tracing::info!("submitting {} jobs for {} {}",self.pipeline,subject,long_scan.as_deref().unwrap_or(""));
        tracing::info!("output resource name: {}",output_resource);

        let working_dir = self.working_dir(subject,long_scan.as_deref());
        tracing::info!("making working directory: {:?}",working_dir);
        fs::create_dir_all(&working_dir).map_err(|e| PipelineError::io(&working_dir,e))?;

        let stem = self.script_stem(subject,long_scan.as_deref(),&session);
        let scripts = vec![
            (ProcessingStage::GetData,self.get_data_script(subject,&working_dir),GET_DATA_SCRIPT_SUFFIX),
            (ProcessingStage::ProcessData,self.work_script(subject,long_scan.as_deref(),&session,&working_dir,parameters)?,WORK_SCRIPT_SUFFIX),
            (ProcessingStage::CleanData,self.clean_script(subject,&working_dir),CLEAN_SCRIPT_SUFFIX),
            (ProcessingStage::PutData,self.put_script(subject,&session,scan,&working_dir,parameters,put_server),PUT_SCRIPT_SUFFIX),
        ];
        let mut written = Vec::<(ProcessingStage,PathBuf)>::new();
        for (stage,script,suffix) in scripts {
            let path = script.write(&working_dir,&format!("{}{}",stem,suffix))?;
            written.push((stage,path));
        }

        let mut jobs = Vec::<SubmittedJob>::new();
        let mut previous:Option<JobId> = None;
        for stage in parameters.processing_stage.submitted_stages() {
            let script = match written.iter().find(|(s,_)| *s == stage) {
                Some((_,p)) => p.clone(),
                None => continue
            };
            let job_id = self.scheduler.submit(&script,previous.as_ref())?;
            tracing::info!("{} job for {}: {}",stage,subject.subject_id,job_id);
            previous = Some(job_id.clone());
            jobs.push(SubmittedJob { stage, script, job_id });
        }

        Ok(UnitSubmission {
            scan:scan.map(|s| s.to_string()),
            working_dir,
            scripts:written,
            jobs,
        })
    }
}
