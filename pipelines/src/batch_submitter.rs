use std::io::Write;
use archive::SubjectInfo;
use pbs::{JobStatus, Scheduler};
use crate::config::BatchConfig;
use crate::error::{PipelineError, Result};
use crate::job_submitter::{OneSubjectJobSubmitter, UnitSubmission};
use crate::shadow::ShadowServerPool;

#[derive(Debug,Default)]
pub struct BatchReport {
    pub submitted:Vec<(SubjectInfo,Vec<UnitSubmission>)>,
    /// subjects left alone because jobs were already queued or running
    pub skipped:Vec<SubjectInfo>,
}

impl BatchReport {
    pub fn job_count(&self) -> usize {
        self.submitted.iter().flat_map(|(_,units)| units.iter()).map(|u| u.jobs.len()).sum()
    }
}

/// Submits the jobs of one pipeline for every subject of a list
pub struct BatchSubmitter<'a> {
    submitter:OneSubjectJobSubmitter<'a>,
    scheduler:&'a dyn Scheduler,
    shadow:ShadowServerPool,
}

fn out(output:&mut dyn Write,line:&str) -> Result<()> {
    writeln!(output,"{}",line).map_err(|e| PipelineError::io("<batch output>",e))
}

fn or_none(value:&Option<String>) -> &str {
    value.as_deref().unwrap_or("None")
}

impl<'a> BatchSubmitter<'a> {
    pub fn new(submitter:OneSubjectJobSubmitter<'a>,scheduler:&'a dyn Scheduler) -> Self {
        let shadow = ShadowServerPool::new(submitter.pipeline().shadow_host_prefix());
        Self { submitter, scheduler, shadow }
    }

    pub fn with_shadow_pool(mut self,shadow:ShadowServerPool) -> Self {
        self.shadow = shadow;
        self
    }

    /// jobs of this pipeline for the subject that are still queued or running
    pub fn queued_or_running(&self,subject:&SubjectInfo) -> Result<Vec<JobStatus>> {
        let prefix = format!("{}.",subject.subject_id);
        Ok(pbs::queued_or_running(self.scheduler,&prefix)?.into_iter()
            .filter(|j| self.submitter.pipeline().owns_job(&j.name,subject))
            .collect())
    }

    pub fn submit_jobs(&mut self,subjects:&[SubjectInfo],config:&BatchConfig,output:&mut dyn Write) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        let pipeline = self.submitter.pipeline();

        for subject in subjects {
            let active = self.queued_or_running(subject)?;
            if !active.is_empty() {
                tracing::debug!("{} has {} active {} jobs",subject,active.len(),pipeline);
                out(output,"-----")?;
                out(output,"\t  NOT SUBMITTING JOBS FOR")?;
                out(output,&format!("\t                project: {}",subject.project))?;
                out(output,&format!("\t                subject: {}",subject.subject_id))?;
                out(output,&format!("\t                  extra: {}",or_none(&subject.extra)))?;
                out(output,&format!("\t structural ref project: {}",or_none(&subject.structural_reference_project)))?;
                out(output,"\t JOBS ARE ALREADY QUEUED OR RUNNING")?;
                report.skipped.push(subject.clone());
                continue
            }

            let put_server = self.shadow.next_put_server();
            let parameters = config.job_parameters(&subject.subject_id)?;

            out(output,"-----")?;
            out(output,&format!("\tSubmitting {} jobs for:",pipeline))?;
            out(output,&format!("\t                project: {}",subject.project))?;
            out(output,&format!("\t                subject: {}",subject.subject_id))?;
            out(output,&format!("\t             classifier: {}",or_none(&subject.classifier)))?;
            out(output,&format!("\t                  extra: {}",or_none(&subject.extra)))?;
            out(output,&format!("\t structural ref project: {}",or_none(&subject.structural_reference_project)))?;
            out(output,&format!("\t             put_server: {}",put_server))?;
            out(output,&format!("\t     clean_output_first: {}",parameters.clean_output_first))?;
            out(output,&format!("\t       processing_stage: {}",parameters.processing_stage))?;
            out(output,&format!("\t     walltime_limit_hrs: {}",parameters.walltime_limit_hours))?;
            out(output,&format!("\t          mem_limit_gbs: {}",parameters.mem_limit_gbs.map(|m| m.to_string()).unwrap_or_else(|| "None".to_string())))?;
            out(output,&format!("\t         vmem_limit_gbs: {}",parameters.vmem_limit_gbs))?;
            out(output,&format!("\t output_resource_suffix: {}",parameters.output_resource_suffix))?;

            let units = self.submitter.submit_jobs(subject,&parameters,&put_server)?;
            for job in units.iter().flat_map(|u| u.jobs.iter()) {
                out(output,&format!("\tsubmitted jobs: {}",job))?;
            }
            out(output,"-----")?;
            report.submitted.push((subject.clone(),units));
        }
        tracing::info!("{} jobs submitted for {} subjects, {} subjects skipped",report.job_count(),report.submitted.len(),report.skipped.len());
        Ok(report)
    }
}
