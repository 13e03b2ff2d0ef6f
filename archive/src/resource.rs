use crate::scan_name::NAME_DELIMITER;

pub const UNPROC_SUFFIX:&str = "unproc";
pub const PREPROC_SUFFIX:&str = "preproc";
pub const FIX_PROCESSED_SUFFIX:&str = "FIX";
pub const RSS_PROCESSED_SUFFIX:&str = "RSS";

pub const FUNCTIONAL_SCAN_MARKER:&str = "fMRI";
pub const RESTING_STATE_SCAN_MARKER:&str = "rfMRI";
pub const TASK_SCAN_MARKER:&str = "tfMRI";
pub const DIFFUSION_SCAN_MARKER:&str = "Diffusion";
pub const STRUCTURAL_SCAN_MARKERS:[&str;2] = ["T1w","T2w"];

pub const STRUCTURAL_PREPROC_RESOURCE_NAME:&str = "Structural_preproc";
pub const SUPPLEMENTAL_STRUCTURAL_PREPROC_RESOURCE_NAME:&str = "Structural_preproc_supplemental";
pub const DEDRIFT_AND_RESAMPLE_HIGHRES_RESOURCE_NAME:&str = "MSMAllDeDrift_HighRes";

/// A processing resource stored under a session's RESOURCES directory
#[derive(Clone,Debug,PartialEq,Eq,Hash)]
pub enum Resource {
    FunctionalUnproc(String),
    FunctionalPreproc(String),
    FixProcessed(String),
    RestingStateStats(String),
    DiffusionUnproc,
    DiffusionPreproc,
    StructuralUnproc(String),
    StructuralPreproc,
    SupplementalStructuralPreproc,
    DeDriftAndResampleHighRes,
    Named(String),
}

fn suffixed(base:&str,suffix:&str) -> String {
    format!("{}{}{}",base,NAME_DELIMITER,suffix)
}

impl Resource {
    /// directory name of the resource
    pub fn name(&self) -> String {
        use Resource::*;
        match self {
            FunctionalUnproc(scan) => suffixed(scan,UNPROC_SUFFIX),
            FunctionalPreproc(scan) => suffixed(scan,PREPROC_SUFFIX),
            FixProcessed(scan) => suffixed(scan,FIX_PROCESSED_SUFFIX),
            RestingStateStats(scan) => suffixed(scan,RSS_PROCESSED_SUFFIX),
            DiffusionUnproc => suffixed(DIFFUSION_SCAN_MARKER,UNPROC_SUFFIX),
            DiffusionPreproc => suffixed(DIFFUSION_SCAN_MARKER,PREPROC_SUFFIX),
            StructuralUnproc(scan) => suffixed(scan,UNPROC_SUFFIX),
            StructuralPreproc => STRUCTURAL_PREPROC_RESOURCE_NAME.to_string(),
            SupplementalStructuralPreproc => SUPPLEMENTAL_STRUCTURAL_PREPROC_RESOURCE_NAME.to_string(),
            DeDriftAndResampleHighRes => DEDRIFT_AND_RESAMPLE_HIGHRES_RESOURCE_NAME.to_string(),
            Named(name) => name.clone(),
        }
    }

    /// structural data of a 7T subject lives in the structural reference session
    pub fn is_structural(&self) -> bool {
        matches!(self,Resource::StructuralUnproc(_) | Resource::StructuralPreproc | Resource::SupplementalStructuralPreproc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_names(){
        assert_eq!(Resource::FunctionalPreproc("rfMRI_REST1_PA".into()).name(),"rfMRI_REST1_PA_preproc");
        assert_eq!(Resource::FixProcessed("tfMRI_MOVIE1_AP".into()).name(),"tfMRI_MOVIE1_AP_FIX");
        assert_eq!(Resource::DiffusionUnproc.name(),"Diffusion_unproc");
        assert_eq!(Resource::StructuralUnproc("T1w_MPR1".into()).name(),"T1w_MPR1_unproc");
        assert_eq!(Resource::Named("MultiRunIcaFix_proc".into()).name(),"MultiRunIcaFix_proc");
        assert!(Resource::StructuralPreproc.is_structural());
        assert!(!Resource::DiffusionPreproc.is_structural());
    }
}
