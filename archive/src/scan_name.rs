use std::fmt;
use std::str::FromStr;
use crate::error::ArchiveError;

pub const NAME_DELIMITER:&str = "_";

/// Short form of a functional scan name, e.g. rfMRI_REST3_PA
#[derive(Clone,Debug,PartialEq,Eq,Hash)]
pub struct FunctionalScanName {
    pub prefix:String,
    pub base_name:String,
    pub pe_dir:String,
}

/// Long form of a functional scan name carrying the tesla spec, e.g. rfMRI_REST3_7T_PA.
/// This is the fMRIName used by the processing pipelines.
#[derive(Clone,Debug,PartialEq,Eq,Hash)]
pub struct LongScanName {
    pub prefix:String,
    pub base_name:String,
    pub tesla_spec:String,
    pub pe_dir:String,
}

fn split_exact(name:&str,expected:usize) -> Result<Vec<&str>,ArchiveError> {
    let tokens:Vec<&str> = name.split(NAME_DELIMITER).collect();
    match tokens.len() == expected && tokens.iter().all(|t| !t.is_empty()) {
        true => Ok(tokens),
        false => Err(ArchiveError::MalformedScanName {
            name:name.to_string(),
            expected,
            found:tokens.len(),
        })
    }
}

impl FromStr for FunctionalScanName {
    type Err = ArchiveError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = split_exact(s,3)?;
        Ok(Self {
            prefix:t[0].to_string(),
            base_name:t[1].to_string(),
            pe_dir:t[2].to_string(),
        })
    }
}

impl FunctionalScanName {
    pub fn long_name(&self,tesla_spec:&str) -> LongScanName {
        LongScanName {
            prefix:self.prefix.clone(),
            base_name:self.base_name.clone(),
            tesla_spec:tesla_spec.to_string(),
            pe_dir:self.pe_dir.clone(),
        }
    }
}

impl fmt::Display for FunctionalScanName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,"{}{d}{}{d}{}",self.prefix,self.base_name,self.pe_dir,d=NAME_DELIMITER)
    }
}

impl FromStr for LongScanName {
    type Err = ArchiveError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = split_exact(s,4)?;
        Ok(Self {
            prefix:t[0].to_string(),
            base_name:t[1].to_string(),
            tesla_spec:t[2].to_string(),
            pe_dir:t[3].to_string(),
        })
    }
}

impl LongScanName {
    pub fn short_name(&self) -> FunctionalScanName {
        FunctionalScanName {
            prefix:self.prefix.clone(),
            base_name:self.base_name.clone(),
            pe_dir:self.pe_dir.clone(),
        }
    }
}

impl fmt::Display for LongScanName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,"{}{d}{}{d}{}{d}{}",self.prefix,self.base_name,self.tesla_spec,self.pe_dir,d=NAME_DELIMITER)
    }
}

/// recover the scan name from a resource directory name, e.g. .../rfMRI_REST1_PA_preproc -> rfMRI_REST1_PA
pub fn scan_name_from_resource_dir(dir_name:&str,suffix:&str) -> Option<String> {
    let base = dir_name.rsplit(std::path::MAIN_SEPARATOR).next()?;
    let stripped = base.strip_suffix(suffix)?.strip_suffix(NAME_DELIMITER)?;
    match stripped.is_empty() {
        true => None,
        false => Some(stripped.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_name_inserts_tesla_spec(){
        let scan:FunctionalScanName = "rfMRI_REST3_PA".parse().unwrap();
        assert_eq!(scan.long_name("7T").to_string(),"rfMRI_REST3_7T_PA");
    }

    #[test]
    fn long_name_round_trips_component_wise(){
        for name in ["rfMRI_REST1_PA","tfMRI_MOVIE2_AP","tfMRI_RETBAR1_AP","rfMRI_REST2_LR"] {
            let short:FunctionalScanName = name.parse().unwrap();
            let long:LongScanName = short.long_name("7T").to_string().parse().unwrap();
            assert_eq!(long.tesla_spec,"7T");
            assert_eq!(long.short_name(),short);
            assert_eq!(long.short_name().to_string(),name);
        }
    }

    #[test]
    fn wrong_token_count_is_rejected(){
        for bad in ["rfMRI_REST1","rfMRI_REST1_7T_PA_extra","rfMRI__PA",""] {
            let err = bad.parse::<FunctionalScanName>().unwrap_err();
            assert!(matches!(err,ArchiveError::MalformedScanName { expected:3, .. }),"{} accepted",bad);
        }
        assert!("rfMRI_REST1_PA".parse::<LongScanName>().is_err());
    }

    #[test]
    fn scan_name_from_dir(){
        assert_eq!(scan_name_from_resource_dir("/a/b/RESOURCES/rfMRI_REST1_PA_preproc","preproc").as_deref(),Some("rfMRI_REST1_PA"));
        assert_eq!(scan_name_from_resource_dir("tfMRI_MOVIE1_AP_FIX","FIX").as_deref(),Some("tfMRI_MOVIE1_AP"));
        assert_eq!(scan_name_from_resource_dir("Diffusion_unproc","preproc"),None);
        assert_eq!(scan_name_from_resource_dir("_preproc","preproc"),None);
    }
}
