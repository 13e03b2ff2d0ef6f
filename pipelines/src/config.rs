use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use archive::ArchiveSettings;
use archive::archive::{ARCHIVE_ROOT_VAR, BUILD_DIR_VAR};
use crate::pipeline::ProcessingStage;

pub const XNAT_SERVER_VAR:&str = "XNAT_PBS_JOBS_XNAT_SERVER";
pub const PIPELINES_HOME_VAR:&str = "XNAT_PBS_JOBS";
pub const PACKAGES_ROOT_VAR:&str = "PACKAGES_ROOT";

/// section consulted when a subject has no value of its own
pub const DEFAULT_SECTION:&str = "DEFAULT";

#[derive(Error,Debug)]
pub enum ConfigError {
    #[error("cannot read config {path:?}: {source}")]
    Read { path:PathBuf, source:std::io::Error },
    #[error("cannot write config {path:?}: {source}")]
    Write { path:PathBuf, source:std::io::Error },
    #[error("config {path:?} is corrupt: {source}")]
    Parse { path:PathBuf, source:toml::de::Error },
    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("no value for {key} in section [{section}] or [DEFAULT]")]
    MissingValue { section:String, key:String },
    #[error("value '{value}' for {key} in section [{section}] is not a valid {expected}")]
    InvalidValue { section:String, key:String, value:String, expected:&'static str },
    #[error(transparent)]
    Env(#[from] utils::EnvError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

pub trait ConfigFile: Sized {
    fn to_file(&self, filename:&Path) -> Result<PathBuf>;
    fn from_file(filename:&Path) -> Result<Self>;
    fn file_ext() -> String;
}

/// Per-subject key/value sections controlling each submission
#[derive(Clone,Debug,Default,PartialEq,Serialize,Deserialize)]
#[serde(transparent)]
pub struct BatchConfig {
    sections:BTreeMap<String,BTreeMap<String,toml::Value>>,
}

impl ConfigFile for BatchConfig {

    fn to_file(&self, filename: &Path) -> Result<PathBuf> {
        let t = toml::to_string_pretty(&self)?;
        utils::write_to_file(filename,&Self::file_ext(),&t)
            .map_err(|source| ConfigError::Write { path:filename.with_extension(Self::file_ext()), source })
    }

    fn from_file(filename: &Path) -> Result<Self> {
        let path = filename.with_extension(Self::file_ext());
        let t = utils::read_to_string(filename,&Self::file_ext())
            .map_err(|source| ConfigError::Read { path:path.clone(), source })?;
        toml::from_str(&t).map_err(|source| ConfigError::Parse { path, source })
    }

    fn file_ext() -> String {
        String::from("toml")
    }

}

fn value_to_string(value:&toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string()
    }
}

impl BatchConfig {
    pub fn from_toml_str(text:&str) -> std::result::Result<Self,toml::de::Error> {
        toml::from_str(text)
    }

    /// A configuration holding only the DEFAULT section, used as a starting point for new batches
    pub fn template() -> Self {
        let mut defaults = BTreeMap::<String,toml::Value>::new();
        defaults.insert("CleanOutputFirst".into(),toml::Value::Boolean(false));
        defaults.insert("ProcessingStage".into(),toml::Value::String(ProcessingStage::PutData.to_string()));
        defaults.insert("WalltimeLimitHours".into(),toml::Value::Integer(24));
        defaults.insert("MemLimitGbs".into(),toml::Value::Integer(12));
        defaults.insert("VmemLimitGbs".into(),toml::Value::Integer(16));
        defaults.insert("OutputResourceSuffix".into(),toml::Value::String("preproc".into()));
        let mut sections = BTreeMap::new();
        sections.insert(DEFAULT_SECTION.to_string(),defaults);
        Self { sections }
    }

    pub fn set_value(&mut self,section:&str,key:&str,value:toml::Value) {
        self.sections.entry(section.to_string()).or_default().insert(key.to_string(),value);
    }

    fn lookup(&self,section:&str,key:&str) -> Option<&toml::Value> {
        self.sections.get(section).and_then(|s| s.get(key))
            .or_else(|| self.sections.get(DEFAULT_SECTION).and_then(|s| s.get(key)))
    }

    pub fn get_optional_value(&self,section:&str,key:&str) -> Option<String> {
        self.lookup(section,key).map(value_to_string)
    }

    pub fn get_value(&self,section:&str,key:&str) -> Result<String> {
        self.get_optional_value(section,key).ok_or_else(|| ConfigError::MissingValue {
            section:section.to_string(),
            key:key.to_string(),
        })
    }

    pub fn get_bool_value(&self,section:&str,key:&str) -> Result<bool> {
        if let Some(toml::Value::Boolean(b)) = self.lookup(section,key) {
            return Ok(*b)
        }
        let value = self.get_value(section,key)?;
        match value.to_lowercase().as_str() {
            "1" | "yes" | "true" | "on" => Ok(true),
            "0" | "no" | "false" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue { section:section.to_string(), key:key.to_string(), value, expected:"boolean" })
        }
    }

    pub fn get_u32_value(&self,section:&str,key:&str) -> Result<u32> {
        let value = self.get_value(section,key)?;
        value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            section:section.to_string(), key:key.to_string(), value, expected:"non-negative integer"
        })
    }

    pub fn get_optional_u32_value(&self,section:&str,key:&str) -> Result<Option<u32>> {
        match self.lookup(section,key) {
            Some(_) => self.get_u32_value(section,key).map(Some),
            None => Ok(None)
        }
    }

    /// job parameters of one subject, falling back to the DEFAULT section
    pub fn job_parameters(&self,subject_id:&str) -> Result<JobParameters> {
        let stage = self.get_value(subject_id,"ProcessingStage")?;
        let processing_stage = stage.parse().map_err(|_| ConfigError::InvalidValue {
            section:subject_id.to_string(), key:"ProcessingStage".into(), value:stage.clone(), expected:"processing stage"
        })?;
        Ok(JobParameters {
            clean_output_first:self.get_bool_value(subject_id,"CleanOutputFirst")?,
            processing_stage,
            walltime_limit_hours:self.get_u32_value(subject_id,"WalltimeLimitHours")?,
            mem_limit_gbs:self.get_optional_u32_value(subject_id,"MemLimitGbs")?,
            vmem_limit_gbs:self.get_u32_value(subject_id,"VmemLimitGbs")?,
            output_resource_suffix:self.get_value(subject_id,"OutputResourceSuffix")?,
            setup_script:self.get_optional_value(subject_id,"SetupScript"),
        })
    }
}

#[derive(Clone,Debug,PartialEq,Eq)]
pub struct JobParameters {
    pub clean_output_first:bool,
    pub processing_stage:ProcessingStage,
    pub walltime_limit_hours:u32,
    pub mem_limit_gbs:Option<u32>,
    pub vmem_limit_gbs:u32,
    pub output_resource_suffix:String,
    pub setup_script:Option<String>,
}

/// Server names and directories taken from the environment
#[derive(Clone,Debug)]
pub struct Environment {
    pub xnat_server:String,
    /// root of the pipeline launch scripts
    pub pipelines_home:PathBuf,
    pub archive:ArchiveSettings,
}

impl Environment {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            xnat_server:utils::getenv_required(XNAT_SERVER_VAR)?,
            pipelines_home:PathBuf::from(utils::getenv_required(PIPELINES_HOME_VAR)?),
            archive:ArchiveSettings::new(
                Path::new(&utils::getenv_required(ARCHIVE_ROOT_VAR)?),
                Path::new(&utils::getenv_required(BUILD_DIR_VAR)?),
            ),
        })
    }

    pub fn server_url(&self) -> String {
        format!("https://{}",self.xnat_server)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG:&str = r#"
[DEFAULT]
CleanOutputFirst = false
ProcessingStage = "PUT_DATA"
WalltimeLimitHours = 24
VmemLimitGbs = 16
OutputResourceSuffix = "preproc"

[102311]
WalltimeLimitHours = 36
CleanOutputFirst = "yes"
ProcessingStage = "process_data"
MemLimitGbs = "12"
SetupScript = "/home/hcp/SetUpHCPPipeline.sh"
"#;

    #[test]
    fn subject_section_overrides_default(){
        let c = BatchConfig::from_toml_str(CONFIG).unwrap();
        let p = c.job_parameters("102311").unwrap();
        assert_eq!(p.walltime_limit_hours,36);
        assert!(p.clean_output_first);
        assert_eq!(p.processing_stage,ProcessingStage::ProcessData);
        assert_eq!(p.mem_limit_gbs,Some(12));
        assert_eq!(p.vmem_limit_gbs,16);
        assert_eq!(p.setup_script.as_deref(),Some("/home/hcp/SetUpHCPPipeline.sh"));

        let d = c.job_parameters("104416").unwrap();
        assert_eq!(d.walltime_limit_hours,24);
        assert!(!d.clean_output_first);
        assert_eq!(d.processing_stage,ProcessingStage::PutData);
        assert_eq!(d.mem_limit_gbs,None);
    }

    #[test]
    fn missing_and_invalid_values(){
        let mut c = BatchConfig::default();
        assert!(matches!(c.get_value("102311","VmemLimitGbs"),Err(ConfigError::MissingValue { .. })));
        c.set_value("102311","VmemLimitGbs",toml::Value::String("lots".into()));
        assert!(matches!(c.get_u32_value("102311","VmemLimitGbs"),Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn template_round_trips_through_file(){
        let dir = tempfile::tempdir().unwrap();
        let t = BatchConfig::template();
        let written = t.to_file(&dir.path().join("FunctionalPreprocessing")).unwrap();
        assert_eq!(written.extension().unwrap(),"toml");
        let back = BatchConfig::from_file(&written).unwrap();
        assert_eq!(back,t);
        assert!(back.job_parameters("any_subject").is_ok());
    }
}
