use std::fs::File;
use std::io::{stdout, Write};
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use archive::{Archive, ArchiveSettings, CcfArchive, Hcp3TArchive, Hcp7TArchive, SubjectInfo, SubjectListLayout};
use archive::completion::CheckOptions;
use archive::subject::read_subject_info_list;
use pbs::Qsub;
use pipelines::args::*;
use pipelines::batch_submitter::BatchSubmitter;
use pipelines::cinab::{self, CinabStyleDataRetriever};
use pipelines::config::{BatchConfig, ConfigFile, Environment, PACKAGES_ROOT_VAR};
use pipelines::credentials::Credentials;
use pipelines::job_submitter::OneSubjectJobSubmitter;
use pipelines::report;
use pipelines::PipelineKind;

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = XnatPbsJobsArgs::parse();
    match args.action {
        Action::SubmitBatch(args) => submit_batch(args).map(|_| ExitCode::SUCCESS),
        Action::SubmitOne(args) => submit_one(args).map(|_| ExitCode::SUCCESS),
        Action::CheckCompletion(args) => check_completion(args),
        Action::GetCinabData(args) => get_cinab_data(args).map(|_| ExitCode::SUCCESS),
        Action::DiffusionPackageReport(args) => diffusion_package_report(args).map(|_| ExitCode::SUCCESS),
        Action::Status(args) => status(args).map(|_| ExitCode::SUCCESS),
        Action::NewConfigTemplate(args) => {
            let path = BatchConfig::template().to_file(&args.output_config)?;
            println!("new config template written to {}",path.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read_subjects(subject_file:&Path,separator:char,layout:SubjectListLayout) -> anyhow::Result<Vec<SubjectInfo>> {
    println!("Retrieving subject list from: {}",subject_file.display());
    read_subject_info_list(subject_file,separator,layout)
        .with_context(|| format!("unable to read subject list {}",subject_file.display()))
}

fn subject_from_args(project:&str,subject:&str,reference_project:&Option<String>,classifier:&Option<String>,scan:&Option<String>) -> SubjectInfo {
    let mut s = SubjectInfo::new(project,subject);
    if let Some(r) = reference_project { s = s.with_reference_project(r) }
    if let Some(c) = classifier { s = s.with_classifier(c) }
    if let Some(n) = scan { s = s.with_extra(n) }
    s
}

fn run_batch(pipeline:PipelineKind,config_file:&Path,subjects:&[SubjectInfo],incomplete_only:bool,delay_seconds:Option<u64>) -> anyhow::Result<()> {
    let env = Environment::from_env().context("job submission environment is incomplete")?;
    println!("Reading configuration from file: {}",config_file.display());
    let config = BatchConfig::from_file(config_file)?;
    let credentials = Credentials::from_env_or_prompt().context("unable to read credentials")?;
    let program = std::env::current_exe().context("cannot locate this executable")?;

    let archive = pipeline.archive(env.archive.clone());
    let scheduler = Qsub::default();
    let mut submitter = OneSubjectJobSubmitter::new(pipeline,archive.as_ref(),&scheduler,&credentials,&env,&program);
    submitter.incomplete_only = incomplete_only;
    if let Some(secs) = delay_seconds {
        submitter.delay = Duration::from_secs(secs);
    }

    let mut batch = BatchSubmitter::new(submitter,&scheduler);
    batch.submit_jobs(subjects,&config,&mut stdout())?;
    Ok(())
}

fn submit_batch(args:SubmitBatchArgs) -> anyhow::Result<()> {
    let subjects = read_subjects(&args.subject_file,args.separator,args.pipeline.subject_list_layout())?;
    run_batch(args.pipeline,&args.config,&subjects,args.incomplete_only,args.delay_seconds)
}

fn submit_one(args:SubmitOneArgs) -> anyhow::Result<()> {
    let subject = subject_from_args(&args.project,&args.subject,&args.reference_project,&args.classifier,&args.scan);
    run_batch(args.pipeline,&args.config,&[subject],args.incomplete_only,args.delay_seconds)
}

fn check_completion(args:CheckCompletionArgs) -> anyhow::Result<ExitCode> {
    let settings = ArchiveSettings::from_env()?;
    let archive = args.pipeline.archive(settings);
    let checker = match args.pipeline.checker() {
        Some(c) => c,
        None => bail!("there is no completion check for {}",args.pipeline)
    };
    let subject = subject_from_args(&args.project,&args.subject,&args.reference_project,&args.classifier,&args.scan);

    let mut output:Box<dyn Write> = match &args.output {
        Some(path) => Box::new(File::create(path).with_context(|| format!("cannot create {}",path.display()))?),
        None => Box::new(stdout())
    };
    let options = CheckOptions { verbose:args.verbose, short_circuit:!args.check_all };
    let mut complete = checker.is_processing_complete(archive.as_ref(),&subject,options,output.as_mut())?;
    if complete && args.marked {
        complete = checker.is_processing_marked_complete(archive.as_ref(),&subject)?;
    }
    output.flush()?;

    match complete {
        true => {
            println!("Exiting with 0 code - Completion Check Successful");
            Ok(ExitCode::SUCCESS)
        }
        false => {
            println!("Exiting with 1 code - Completion Check Unsuccessful");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn get_cinab_data(args:GetCinabDataArgs) -> anyhow::Result<()> {
    let settings = ArchiveSettings::from_env()?;
    let archive:Box<dyn Archive> = match (&args.classifier,args.tesla) {
        (Some(_),_) => Box::new(CcfArchive::new(settings)),
        (None,Tesla::ThreeT) => Box::new(Hcp3TArchive::new(settings)),
        (None,Tesla::SevenT) => Box::new(Hcp7TArchive::new(settings)),
    };
    let subject = subject_from_args(&args.project,&args.subject,&args.reference_project,&args.classifier,&None);

    tracing::info!("project: {}",args.project);
    tracing::info!("subject: {}",args.subject);
    tracing::info!("output study dir: {}",args.study_dir.display());
    tracing::info!("copy: {}",args.copy);
    tracing::info!("phase: {}",args.phase);
    tracing::info!("remove non-subdirs: {}",args.remove_non_subdirs);

    let mut retriever = CinabStyleDataRetriever::new(archive.as_ref());
    retriever.copy = args.copy;
    retriever.show_log = args.log;
    retriever.get_phase_data(args.phase,&subject,&args.study_dir)
        .with_context(|| format!("unable to retrieve {} data for {}",args.phase,subject))?;
    if args.remove_non_subdirs {
        cinab::remove_non_subdirs(&args.study_dir)?;
    }
    Ok(())
}

fn diffusion_package_report(args:ReportArgs) -> anyhow::Result<()> {
    let packages_root = utils::getenv_required(PACKAGES_ROOT_VAR)?;
    let archive = Hcp7TArchive::new(ArchiveSettings::from_env()?);
    let subjects = read_subjects(&args.subject_file,args.separator,SubjectListLayout::Hcp7T)?;
    report::write_diffusion_package_report(Path::new(&packages_root),&archive,&subjects,&mut stdout())?;
    Ok(())
}

fn status(args:StatusArgs) -> anyhow::Result<()> {
    let subjects = read_subjects(&args.subject_file,args.separator,args.pipeline.subject_list_layout())?;
    let scheduler = Qsub::default();
    for subject in &subjects {
        let prefix = format!("{}.",subject.subject_id);
        let jobs:Vec<_> = pbs::queued_or_running(&scheduler,&prefix)?.into_iter()
            .filter(|j| args.pipeline.owns_job(&j.name,subject))
            .collect();
        println!("{}: {} {} jobs queued or running",subject,jobs.len(),args.pipeline);
        for j in jobs {
            println!("\t{}\t{:?}\t{}",j.id,j.state,j.name);
        }
    }
    Ok(())
}
