use std::fs;
use std::path::Path;
use archive::{Archive, ArchiveSettings, CompletionChecker, Hcp7TArchive, Resource, SubjectInfo};
use archive::completion::{CheckOptions, IcaFix7TChecker};
use filetime::{set_file_mtime, FileTime};

const T0:i64 = 1_600_000_000;

fn set_mtime(path:&Path,secs:i64){
    set_file_mtime(path,FileTime::from_unix_time(secs,0)).unwrap();
}

fn touch(path:&Path){
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path,"").unwrap();
}

fn scratch_archive() -> (tempfile::TempDir,Hcp7TArchive,SubjectInfo) {
    let dir = tempfile::tempdir().unwrap();
    let settings = ArchiveSettings::new(&dir.path().join("archive"),&dir.path().join("build"));
    let archive = Hcp7TArchive::new(settings);
    let subject = SubjectInfo::new("HCP_Staging_7T","102311").with_reference_project("HCP_500");
    let resources = archive.subject_resources_dir(&subject).unwrap();
    for name in [
        "rfMRI_REST1_PA_unproc",
        "rfMRI_REST1_PA_preproc",
        "rfMRI_REST2_AP_preproc",
        "tfMRI_MOVIE1_AP_preproc",
        "tfMRI_RETBAR1_AP_preproc",
        "rfMRI_REST1_PA_FIX",
        "Diffusion_unproc",
    ] {
        fs::create_dir_all(resources.join(name)).unwrap();
    }
    fs::create_dir_all(archive.project_archive_root("HCP_Staging_7T").join("104416_7T")).unwrap();
    (dir,archive,subject)
}

#[test]
fn discovers_available_resources(){
    let (_dir,archive,subject) = scratch_archive();
    assert_eq!(archive.available_functional_unproc_names(&subject).unwrap(),vec!["rfMRI_REST1_PA"]);
    assert_eq!(
        archive.available_functional_preproc_names(&subject).unwrap(),
        vec!["rfMRI_REST1_PA","rfMRI_REST2_AP","tfMRI_MOVIE1_AP","tfMRI_RETBAR1_AP"]
    );
    assert_eq!(archive.available_resting_state_preproc_names(&subject).unwrap(),vec!["rfMRI_REST1_PA","rfMRI_REST2_AP"]);
    assert_eq!(archive.available_movie_preproc_names(&subject).unwrap(),vec!["tfMRI_MOVIE1_AP"]);
    assert_eq!(archive.available_retinotopy_preproc_names(&subject).unwrap(),vec!["tfMRI_RETBAR1_AP"]);
    assert_eq!(archive.available_fix_processed_names(&subject).unwrap(),vec!["rfMRI_REST1_PA"]);
    assert!(archive.does_diffusion_unproc_dir_exist(&subject).unwrap());
    assert!(archive.resource_exists(&subject,&Resource::DiffusionUnproc).unwrap());
    assert!(!archive.resource_exists(&subject,&Resource::DiffusionPreproc).unwrap());
    assert_eq!(archive.available_subject_ids("HCP_Staging_7T"),vec!["102311","104416"]);
    assert_eq!(archive.subject_count("HCP_Staging_7T"),2);
}

#[test]
fn ica_fix_complete_only_when_every_file_exists(){
    let (_dir,archive,subject) = scratch_archive();
    let subject = subject.with_extra("rfMRI_REST1_PA");
    let checker = IcaFix7TChecker;
    let files = checker.expected_files(&archive,&subject).unwrap();

    // all but the last expected file
    for f in &files[..files.len()-1] {
        touch(f);
    }
    let mut out = Vec::<u8>::new();
    assert!(!checker.is_processing_complete(&archive,&subject,CheckOptions::quick(),&mut out).unwrap());
    let report = String::from_utf8(out).unwrap();
    assert!(report.contains("prefiltered_func_data_mcf.par"));

    touch(files.last().unwrap());
    let mut out = Vec::<u8>::new();
    assert!(checker.is_processing_complete(&archive,&subject,CheckOptions::quick(),&mut out).unwrap());
}

#[test]
fn missing_resource_is_incomplete(){
    let (_dir,archive,subject) = scratch_archive();
    let subject = subject.with_extra("rfMRI_REST2_AP");
    let mut out = Vec::<u8>::new();
    assert!(!IcaFix7TChecker.is_processing_complete(&archive,&subject,CheckOptions::quick(),&mut out).unwrap());
    assert!(String::from_utf8(out).unwrap().contains("DOES NOT EXIST"));
}

#[test]
fn marked_complete_requires_marker(){
    let (_dir,archive,subject) = scratch_archive();
    let subject = subject.with_extra("rfMRI_REST1_PA");
    let checker = IcaFix7TChecker;
    assert!(!checker.is_processing_marked_complete(&archive,&subject).unwrap());
    touch(&checker.starttime_marker_file(&archive,&subject).unwrap());
    touch(&checker.completion_marker_file(&archive,&subject).unwrap());
    assert!(checker.is_processing_marked_complete(&archive,&subject).unwrap());
}

#[test]
fn completion_marker_older_than_start_is_stale(){
    let (_dir,archive,subject) = scratch_archive();
    let subject = subject.with_extra("rfMRI_REST1_PA");
    let checker = IcaFix7TChecker;
    let started = checker.starttime_marker_file(&archive,&subject).unwrap();
    let marker = checker.completion_marker_file(&archive,&subject).unwrap();
    touch(&started);
    touch(&marker);
    let preproc = archive.resource_dir(&subject,&Resource::FunctionalPreproc("rfMRI_REST1_PA".into())).unwrap();
    set_mtime(&preproc,T0-600);

    set_mtime(&marker,T0);
    set_mtime(&started,T0+60);
    assert!(!checker.is_processing_marked_complete(&archive,&subject).unwrap());

    set_mtime(&started,T0-60);
    assert!(checker.is_processing_marked_complete(&archive,&subject).unwrap());
}

#[test]
fn prerequisite_newer_than_marker_is_stale(){
    let (_dir,archive,subject) = scratch_archive();
    let subject = subject.with_extra("rfMRI_REST1_PA");
    let checker = IcaFix7TChecker;
    let started = checker.starttime_marker_file(&archive,&subject).unwrap();
    let marker = checker.completion_marker_file(&archive,&subject).unwrap();
    touch(&started);
    touch(&marker);
    set_mtime(&started,T0-60);
    set_mtime(&marker,T0);

    let preproc = archive.resource_dir(&subject,&Resource::FunctionalPreproc("rfMRI_REST1_PA".into())).unwrap();
    set_mtime(&preproc,T0+60);
    assert!(!checker.is_processing_marked_complete(&archive,&subject).unwrap());

    set_mtime(&preproc,T0-600);
    assert!(checker.is_processing_marked_complete(&archive,&subject).unwrap());
}
