use std::collections::HashMap;

#[derive(PartialEq,Eq,Debug,Clone,Copy)]
pub enum JobState {
    Queued,
    Running,
    Held,
    Waiting,
    Transit,
    Exiting,
    Suspended,
    Completed,
    Unknown,
}

impl JobState {
    /// PBS single letter job states
    pub fn from_code(code:&str) -> JobState {
        match code.trim() {
            "Q" => JobState::Queued,
            "R" => JobState::Running,
            "H" => JobState::Held,
            "W" => JobState::Waiting,
            "T" => JobState::Transit,
            "E" => JobState::Exiting,
            "S" => JobState::Suspended,
            "C" => JobState::Completed,
            _ => JobState::Unknown
        }
    }

    /// still waiting to run or currently running
    pub fn is_queued_or_running(&self) -> bool {
        !matches!(self,JobState::Completed | JobState::Exiting | JobState::Unknown)
    }
}

#[derive(Clone,Debug,PartialEq,Eq)]
pub struct JobStatus {
    pub id:String,
    pub name:String,
    pub owner:String,
    pub state:JobState,
}

impl JobStatus {
    /// user part of user@host
    pub fn owner_user(&self) -> &str {
        self.owner.split('@').next().unwrap_or_default()
    }
}

fn finish_job(id:Option<String>,attributes:&mut HashMap<String,String>,jobs:&mut Vec<JobStatus>) {
    if let Some(id) = id {
        jobs.push(JobStatus {
            id,
            name:attributes.remove("Job_Name").unwrap_or_default(),
            owner:attributes.remove("Job_Owner").unwrap_or_default(),
            state:JobState::from_code(attributes.get("job_state").map(|s| s.as_str()).unwrap_or_default()),
        });
    }
    attributes.clear();
}

/// Parse the output of `qstat -f`. Long attribute values are wrapped by qstat onto
/// continuation lines that start with a tab.
pub fn parse_full_status(text:&str) -> Vec<JobStatus> {
    let mut jobs = Vec::<JobStatus>::new();
    let mut current_id:Option<String> = None;
    let mut attributes = HashMap::<String,String>::new();
    let mut last_key:Option<String> = None;

    for line in text.lines() {
        if let Some(id) = line.strip_prefix("Job Id:") {
            finish_job(current_id.take(),&mut attributes,&mut jobs);
            current_id = Some(id.trim().to_string());
            last_key = None;
            continue
        }
        if line.starts_with('\t') {
            if let Some(value) = last_key.as_ref().and_then(|k| attributes.get_mut(k)) {
                value.push_str(line.trim());
            }
            continue
        }
        match line.find(" = ") {
            Some(index) => {
                let (key,value) = line.split_at(index);
                let key = key.trim().to_string();
                attributes.insert(key.clone(),value[3..].trim().to_string());
                last_key = Some(key);
            }
            None => last_key = None
        }
    }
    finish_job(current_id,&mut attributes,&mut jobs);
    jobs
}

#[cfg(test)]
mod tests {
    use super::*;

    const QSTAT:&str = "Job Id: 1234567.login01.cluster
    Job_Name = 102311.rfMRI_REST1_7T_PA.IcaFixProcessingHCP7T.HCP_Staging_7T.1023
\t11_7T.XNAT_PBS_job
    Job_Owner = hcpuser@login01.cluster
    job_state = R
    queue = dque

Job Id: 1234568.login01.cluster
    Job_Name = 102311.rfMRI_REST1_7T_PA.PUT
    Job_Owner = hcpuser@login01.cluster
    job_state = H

Job Id: 1234569.login01.cluster
    Job_Name = 100307.FunctionalPreprocessing
    Job_Owner = other@login01.cluster
    job_state = C
";

    #[test]
    fn parses_blocks_and_continuations(){
        let jobs = parse_full_status(QSTAT);
        assert_eq!(jobs.len(),3);
        assert_eq!(jobs[0].id,"1234567.login01.cluster");
        assert_eq!(jobs[0].name,"102311.rfMRI_REST1_7T_PA.IcaFixProcessingHCP7T.HCP_Staging_7T.102311_7T.XNAT_PBS_job");
        assert_eq!(jobs[0].state,JobState::Running);
        assert_eq!(jobs[0].owner_user(),"hcpuser");
        assert_eq!(jobs[1].state,JobState::Held);
        assert!(jobs[1].state.is_queued_or_running());
        assert_eq!(jobs[2].state,JobState::Completed);
        assert!(!jobs[2].state.is_queued_or_running());
    }

    #[test]
    fn empty_output_has_no_jobs(){
        assert!(parse_full_status("").is_empty());
    }
}
