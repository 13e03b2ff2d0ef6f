use std::fmt;
use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;
use regex::Regex;
use crate::error::{PbsError, Result};
use crate::qstat::{self, JobStatus};

/// Job identifier assigned by the scheduler, e.g. 1234567.login01.cluster
#[derive(Clone,Debug,PartialEq,Eq,Hash)]
pub struct JobId(String);

impl JobId {
    pub fn new(id:&str) -> Self {
        JobId(id.to_string())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,"{}",self.0)
    }
}

/// 12345.torquehost, or 12345[] for an array job
fn job_id_pattern() -> Option<&'static Regex> {
    static PATTERN:OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d+(\[\d*\])?(\.[\w.-]+)?$").ok()).as_ref()
}

/// The batch system jobs are handed to
pub trait Scheduler {
    /// submit a script, optionally to start only after another job completes successfully
    fn submit(&self,script:&Path,after_ok:Option<&JobId>) -> Result<JobId>;
    /// jobs currently known to the scheduler
    fn query(&self) -> Result<Vec<JobStatus>>;
}

/// PBS/Torque command line tools
#[derive(Clone,Debug)]
pub struct Qsub {
    pub submit_program:String,
    pub status_program:String,
    /// only report jobs belonging to this user
    pub owner:Option<String>,
}

impl Default for Qsub {
    fn default() -> Self {
        Self {
            submit_program:String::from("qsub"),
            status_program:String::from("qstat"),
            owner:Some(whoami::username()),
        }
    }
}

fn run(cmd:&mut Command,program:&str) -> Result<String> {
    tracing::debug!("running {:?}",cmd);
    let o = cmd.output().map_err(|source| PbsError::Launch { program:program.to_string(), source })?;
    match o.status.success() {
        true => Ok(String::from_utf8_lossy(&o.stdout).to_string()),
        false => Err(PbsError::CommandFailed {
            program:program.to_string(),
            status:o.status,
            stderr:String::from_utf8_lossy(&o.stderr).trim().to_string(),
        })
    }
}

impl Qsub {
    pub fn submit_command(&self,script:&Path,after_ok:Option<&JobId>) -> Command {
        let mut cmd = Command::new(&self.submit_program);
        if let Some(jid) = after_ok {
            cmd.arg("-W").arg(format!("depend=afterok:{}",jid));
        }
        cmd.arg(script);
        cmd
    }

    pub fn response_to_job_id(resp:&str) -> Result<JobId> {
        let id = utils::remove_ending_new_lines(resp);
        let id = id.trim();
        match job_id_pattern() {
            Some(valid) if valid.is_match(id) => Ok(JobId::new(id)),
            _ => Err(PbsError::NoJobId(resp.to_string()))
        }
    }
}

impl Scheduler for Qsub {
    fn submit(&self,script:&Path,after_ok:Option<&JobId>) -> Result<JobId> {
        let mut cmd = self.submit_command(script,after_ok);
        let response = run(&mut cmd,&self.submit_program)?;
        let jid = Self::response_to_job_id(&response)?;
        tracing::info!("submitted {:?} as job {}",script,jid);
        Ok(jid)
    }

    fn query(&self) -> Result<Vec<JobStatus>> {
        let mut cmd = Command::new(&self.status_program);
        cmd.arg("-f");
        let text = run(&mut cmd,&self.status_program)?;
        let jobs = qstat::parse_full_status(&text);
        Ok(match &self.owner {
            Some(user) => jobs.into_iter().filter(|j| j.owner_user() == user).collect(),
            None => jobs
        })
    }
}

/// queued or running jobs whose names start with `name_prefix`
pub fn queued_or_running(scheduler:&dyn Scheduler,name_prefix:&str) -> Result<Vec<JobStatus>> {
    Ok(scheduler.query()?.into_iter()
        .filter(|j| j.name.starts_with(name_prefix) && j.state.is_queued_or_running())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qstat::JobState;

    #[test]
    fn job_id_from_response(){
        assert_eq!(Qsub::response_to_job_id("1234567.login01.cluster\n").unwrap().as_str(),"1234567.login01.cluster");
        assert_eq!(Qsub::response_to_job_id("42\n\n").unwrap().as_str(),"42");
        assert!(Qsub::response_to_job_id("").is_err());
        assert!(Qsub::response_to_job_id("qsub: submit error").is_err());
        assert_eq!(Qsub::response_to_job_id("77[].host\n").unwrap().as_str(),"77[].host");
    }

    #[test]
    fn job_id_pattern_is_built_once(){
        let first = job_id_pattern().unwrap();
        let second = job_id_pattern().unwrap();
        assert!(std::ptr::eq(first,second));
    }

    #[test]
    fn dependency_is_passed_to_qsub(){
        let q = Qsub { owner:None, ..Qsub::default() };
        let jid = JobId::new("99.host");
        let cmd = q.submit_command(Path::new("/wd/put.sh"),Some(&jid));
        let args:Vec<String> = cmd.get_args().map(|a| a.to_string_lossy().to_string()).collect();
        assert_eq!(args,vec!["-W","depend=afterok:99.host","/wd/put.sh"]);
    }

    struct Listed(Vec<JobStatus>);

    impl Scheduler for Listed {
        fn submit(&self,_script:&Path,_after_ok:Option<&JobId>) -> Result<JobId> {
            Ok(JobId::new("1"))
        }
        fn query(&self) -> Result<Vec<JobStatus>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn filters_by_prefix_and_state(){
        let job = |name:&str,state| JobStatus { id:String::from("1"), name:name.to_string(), owner:String::from("u@h"), state };
        let s = Listed(vec![
            job("102311.rfMRI_REST1_7T_PA.IcaFix",JobState::Queued),
            job("102311.rfMRI_REST2_7T_AP.IcaFix",JobState::Completed),
            job("104416.rfMRI_REST1_7T_PA.IcaFix",JobState::Running),
        ]);
        let active = queued_or_running(&s,"102311.").unwrap();
        assert_eq!(active.len(),1);
        assert_eq!(active[0].name,"102311.rfMRI_REST1_7T_PA.IcaFix");
    }
}
