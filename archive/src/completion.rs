use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use crate::archive::Archive;
use crate::error::{ArchiveError, Result};
use crate::resource::Resource;
use crate::subject::SubjectInfo;

pub const PROCESSING_INFO_DIR_NAME:&str = "ProcessingInfo";

#[derive(Clone,Copy,Debug,Default)]
pub struct CheckOptions {
    /// report every file as it is checked
    pub verbose:bool,
    /// stop at the first missing file
    pub short_circuit:bool,
}

impl CheckOptions {
    pub fn quick() -> Self {
        Self { verbose:false, short_circuit:true }
    }
}

fn write_line(output:&mut dyn Write,msg:&str) -> Result<()> {
    writeln!(output,"{}",msg).map_err(|e| ArchiveError::io("<completion output>",e))
}

/// True only when every listed file exists. Every missing file examined is reported on `output`.
pub fn do_all_files_exist(files:&[PathBuf],options:CheckOptions,output:&mut dyn Write) -> Result<bool> {
    let mut all_exist = true;
    for file in files {
        if options.verbose {
            write_line(output,&format!("Checking for existence of: {}",file.display()))?;
        }
        if file.is_file() {
            continue
        }
        write_line(output,&format!("FILE DOES NOT EXIST: {}",file.display()))?;
        all_exist = false;
        if options.short_circuit {
            return Ok(false)
        }
    }
    Ok(all_exist)
}

fn modified(path:&Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

pub fn scan_of(subject:&SubjectInfo) -> Result<&str> {
    subject.extra.as_deref().ok_or_else(|| ArchiveError::MissingScan(subject.subject_id.clone()))
}

/// Decides whether a pipeline produced its outputs for one subject (or subject scan)
pub trait CompletionChecker {
    fn pipeline_name(&self) -> &str;

    /// the output resource directory of the pipeline
    fn my_resource(&self,archive:&dyn Archive,subject:&SubjectInfo) -> Result<PathBuf>;

    fn prerequisite_dirs(&self,_archive:&dyn Archive,_subject:&SubjectInfo) -> Result<Vec<PathBuf>> {
        Ok(vec![])
    }

    fn expected_files(&self,archive:&dyn Archive,subject:&SubjectInfo) -> Result<Vec<PathBuf>>;

    fn completion_marker_file_name(&self) -> String {
        format!("{}.XNAT_CHECK.success",self.pipeline_name())
    }

    fn starttime_marker_file_name(&self) -> String {
        format!("{}.starttime",self.pipeline_name())
    }

    fn completion_marker_file(&self,archive:&dyn Archive,subject:&SubjectInfo) -> Result<PathBuf> {
        Ok(self.my_resource(archive,subject)?
            .join(PROCESSING_INFO_DIR_NAME)
            .join(format!("{}.{}",subject.subject_id,self.completion_marker_file_name())))
    }

    fn starttime_marker_file(&self,archive:&dyn Archive,subject:&SubjectInfo) -> Result<PathBuf> {
        Ok(self.my_resource(archive,subject)?
            .join(PROCESSING_INFO_DIR_NAME)
            .join(format!("{}.{}",subject.subject_id,self.starttime_marker_file_name())))
    }

    fn is_processing_complete(&self,archive:&dyn Archive,subject:&SubjectInfo,options:CheckOptions,output:&mut dyn Write) -> Result<bool> {
        let resource = self.my_resource(archive,subject)?;
        if !resource.is_dir() {
            write_line(output,&format!("resource: {} DOES NOT EXIST",resource.display()))?;
            return Ok(false)
        }
        let files = self.expected_files(archive,subject)?;
        tracing::debug!("{}: checking {} expected files for {}",self.pipeline_name(),files.len(),subject);
        do_all_files_exist(&files,options,output)
    }

    /// The completion marker must exist and be no older than the start time marker and
    /// every prerequisite resource.
    fn is_processing_marked_complete(&self,archive:&dyn Archive,subject:&SubjectInfo) -> Result<bool> {
        let marker = self.completion_marker_file(archive,subject)?;
        let marked = match modified(&marker) {
            Some(t) => t,
            None => return Ok(false)
        };
        if let Some(started) = modified(&self.starttime_marker_file(archive,subject)?) {
            if marked < started {
                return Ok(false)
            }
        }
        for dir in self.prerequisite_dirs(archive,subject)? {
            match modified(&dir) {
                Some(t) if t > marked => return Ok(false),
                _ => {}
            }
        }
        Ok(true)
    }
}

/// CCF functional preprocessing of one scan (the scan is the subject's extra field)
pub struct FunctionalPreprocessingChecker;

impl CompletionChecker for FunctionalPreprocessingChecker {
    fn pipeline_name(&self) -> &str {
        "FunctionalPreprocessing"
    }

    fn my_resource(&self,archive:&dyn Archive,subject:&SubjectInfo) -> Result<PathBuf> {
        archive.resource_dir(subject,&Resource::FunctionalPreproc(scan_of(subject)?.to_string()))
    }

    fn prerequisite_dirs(&self,archive:&dyn Archive,subject:&SubjectInfo) -> Result<Vec<PathBuf>> {
        Ok(vec![archive.resource_dir(subject,&Resource::StructuralPreproc)?])
    }

    fn expected_files(&self,archive:&dyn Archive,subject:&SubjectInfo) -> Result<Vec<PathBuf>> {
        let scan = archive.functional_scan_long_name(scan_of(subject)?)?;
        let root = self.my_resource(archive,subject)?.join(&subject.subject_id);

        let mut files = Vec::<PathBuf>::new();

        let volume_dir = root.join(&scan);
        for name in [
            format!("{}_orig.nii.gz",scan),
            format!("{}_SBRef_nonlin.nii.gz",scan),
            format!("{}_nonlin.nii.gz",scan),
            format!("{}_nonlin_mask.nii.gz",scan),
            "Movement_Regressors.txt".to_string(),
            "Movement_Regressors_dt.txt".to_string(),
            "Movement_AbsoluteRMS.txt".to_string(),
            "Movement_RelativeRMS.txt".to_string(),
        ] {
            files.push(volume_dir.join(name));
        }

        let results_dir = root.join("MNINonLinear").join("Results").join(&scan);
        for name in [
            format!("{}.nii.gz",scan),
            format!("{}_SBRef.nii.gz",scan),
            format!("{}_Atlas.dtseries.nii",scan),
            format!("{}_Jacobian.nii.gz",scan),
            format!("{}_dropouts.nii.gz",scan),
            format!("{}_sebased_bias.nii.gz",scan),
            format!("{}_sebased_reference.nii.gz",scan),
            format!("{}_Atlas_mean.dscalar.nii",scan),
            "brainmask_fs.2.nii.gz".to_string(),
            "Movement_Regressors.txt".to_string(),
            "Movement_Regressors_dt.txt".to_string(),
            "Movement_AbsoluteRMS.txt".to_string(),
            "Movement_RelativeRMS.txt".to_string(),
            "PhaseOne_gdc_dc.nii.gz".to_string(),
            "PhaseTwo_gdc_dc.nii.gz".to_string(),
            "RibbonVolumeToSurfaceMapping/goodvoxels.nii.gz".to_string(),
        ] {
            files.push(results_dir.join(name));
        }

        Ok(files)
    }
}

/// HCP 7T ICA+FIX processing of one scan
pub struct IcaFix7TChecker;

const ICA_DIR_FILES:[&str;3] = [
    "Atlas_hp_preclean.dtseries.nii",
    "Atlas.nii.gz",
    "mask.nii.gz",
];

const FILTERED_FUNC_FILES:[&str;19] = [
    "eigenvalues_percent",
    "log.txt",
    "mask.nii.gz",
    "mean.nii.gz",
    "melodic_dewhite",
    "melodic_FTdewhite",
    "melodic_FTmix",
    "melodic_IC.nii.gz",
    "melodic_ICstats",
    "melodic_mix",
    "melodic_oIC.nii.gz",
    "melodic_pcaD",
    "melodic_pcaE",
    "melodic_pca.nii.gz",
    "melodic_PPCA",
    "melodic_Tmodes",
    "melodic_unmix",
    "melodic_white",
    "Noise__inv.nii.gz",
];

const FIX_FILES:[&str;25] = [
    "fastsg_mixeltype.nii.gz",
    "fastsg_seg.nii.gz",
    "features.csv",
    "features_info.csv",
    "features.mat",
    "highres2std.mat",
    "hr2exf.nii.gz",
    "hr2exfTMP.nii.gz",
    "hr2exfTMP.txt",
    "logMatlab.txt",
    "std1mm2exfunc0dil2.nii.gz",
    "std1mm2exfunc0dil.nii.gz",
    "std1mm2exfunc0.nii.gz",
    "std1mm2exfunc1dil2.nii.gz",
    "std1mm2exfunc1dil.nii.gz",
    "std1mm2exfunc1.nii.gz",
    "std1mm2exfunc2dil2.nii.gz",
    "std1mm2exfunc2dil.nii.gz",
    "std1mm2exfunc2.nii.gz",
    "std1mm2exfunc3dil2.nii.gz",
    "std1mm2exfunc3dil.nii.gz",
    "std1mm2exfunc3.nii.gz",
    "std2exfunc.mat",
    "std2highres.mat",
    "subcort.nii.gz",
];

const REG_FILES:[&str;3] = [
    "highres2example_func.mat",
    "veins_exf.nii.gz",
    "veins.nii.gz",
];

const MC_FILES:[&str;3] = [
    "prefiltered_func_data_mcf_conf_hp.nii.gz",
    "prefiltered_func_data_mcf_conf.nii.gz",
    "prefiltered_func_data_mcf.par",
];

impl CompletionChecker for IcaFix7TChecker {
    fn pipeline_name(&self) -> &str {
        "IcaFixProcessingHCP7T"
    }

    fn my_resource(&self,archive:&dyn Archive,subject:&SubjectInfo) -> Result<PathBuf> {
        archive.resource_dir(subject,&Resource::FixProcessed(scan_of(subject)?.to_string()))
    }

    fn prerequisite_dirs(&self,archive:&dyn Archive,subject:&SubjectInfo) -> Result<Vec<PathBuf>> {
        Ok(vec![archive.resource_dir(subject,&Resource::FunctionalPreproc(scan_of(subject)?.to_string()))?])
    }

    fn expected_files(&self,archive:&dyn Archive,subject:&SubjectInfo) -> Result<Vec<PathBuf>> {
        let long_name = archive.functional_scan_long_name(scan_of(subject)?)?;
        let ica_dir = self.my_resource(archive,subject)?
            .join(&long_name)
            .join(format!("{}_hp2000.ica",long_name));

        let mut files:Vec<PathBuf> = ICA_DIR_FILES.iter().map(|f| ica_dir.join(f)).collect();
        let filtered_func_dir = ica_dir.join("filtered_func_data.ica");
        files.extend(FILTERED_FUNC_FILES.iter().map(|f| filtered_func_dir.join(f)));
        let fix_dir = ica_dir.join("fix");
        files.extend(FIX_FILES.iter().map(|f| fix_dir.join(f)));
        let reg_dir = ica_dir.join("reg");
        files.extend(REG_FILES.iter().map(|f| reg_dir.join(f)));
        let mc_dir = ica_dir.join("mc");
        files.extend(MC_FILES.iter().map(|f| mc_dir.join(f)));
        Ok(files)
    }
}

/// HCP 7T diffusion preprocessing of one subject
pub struct DiffusionPreprocessing7TChecker;

impl CompletionChecker for DiffusionPreprocessing7TChecker {
    fn pipeline_name(&self) -> &str {
        "DiffusionPreprocessingHCP7T"
    }

    fn my_resource(&self,archive:&dyn Archive,subject:&SubjectInfo) -> Result<PathBuf> {
        archive.resource_dir(subject,&Resource::DiffusionPreproc)
    }

    fn prerequisite_dirs(&self,archive:&dyn Archive,subject:&SubjectInfo) -> Result<Vec<PathBuf>> {
        Ok(vec![
            archive.resource_dir(subject,&Resource::DiffusionUnproc)?,
            archive.resource_dir(subject,&Resource::StructuralPreproc)?,
        ])
    }

    fn expected_files(&self,archive:&dyn Archive,subject:&SubjectInfo) -> Result<Vec<PathBuf>> {
        let diffusion_dir = self.my_resource(archive,subject)?
            .join(&subject.subject_id)
            .join("T1w")
            .join(format!("Diffusion_{}",archive.tesla_spec()));
        let mut files:Vec<PathBuf> = ["bvals","bvecs","data.nii.gz","grad_dev.nii.gz","nodif_brain_mask.nii.gz"]
            .iter().map(|f| diffusion_dir.join(f)).collect();
        let eddy_dir = diffusion_dir.join("eddylogs");
        files.extend(["eddy_unwarped_images.eddy_parameters","eddy_unwarped_images.eddy_movement_rms"]
            .iter().map(|f| eddy_dir.join(f)));
        files.push(self.my_resource(archive,subject)?
            .join(&subject.subject_id)
            .join("T1w")
            .join(format!("xfms_{}",archive.tesla_spec()))
            .join("diff2str.mat"));
        Ok(files)
    }
}
