use std::fs::{self, File};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use crate::error::{PbsError, Result};

/// owner and group may read, write and execute
pub const SCRIPT_MODE:u32 = 0o770;

#[derive(Clone,Debug,PartialEq)]
pub struct PbsOpts {
    pub job_name:Option<String>,
    pub nodes:u32,
    pub ppn:u32,
    pub walltime_hours:u32,
    pub mem_gb:Option<u32>,
    pub vmem_gb:Option<u32>,
    pub stdout_dir:Option<PathBuf>,
    pub stderr_dir:Option<PathBuf>,
}

impl PbsOpts {
    pub fn new(walltime_hours:u32) -> PbsOpts {
        PbsOpts {
            job_name:None,
            nodes:1,
            ppn:1,
            walltime_hours,
            mem_gb:None,
            vmem_gb:None,
            stdout_dir:None,
            stderr_dir:None,
        }
    }

    /// send both output streams to the same directory
    pub fn output_to(mut self,dir:&Path) -> Self {
        self.stdout_dir = Some(dir.to_owned());
        self.stderr_dir = Some(dir.to_owned());
        self
    }

    pub fn resource_list(&self) -> String {
        let mut list = format!("nodes={}:ppn={},walltime={}:00:00",self.nodes,self.ppn,self.walltime_hours);
        if let Some(mem) = self.mem_gb { list.push_str(&format!(",mem={}gb",mem)) }
        if let Some(vmem) = self.vmem_gb { list.push_str(&format!(",vmem={}gb",vmem)) }
        list
    }

    pub fn print(&self) -> String {
        let mut opts = Vec::<String>::new();
        if let Some(name) = &self.job_name { opts.push(format!("#PBS -N {}",name)) }
        opts.push(format!("#PBS -l {}",self.resource_list()));
        if let Some(dir) = &self.stdout_dir { opts.push(format!("#PBS -o {}",dir.display())) }
        if let Some(dir) = &self.stderr_dir { opts.push(format!("#PBS -e {}",dir.display())) }
        opts.join("\n")
    }
}

/// A program invocation with named flags, rendered one flag per line
#[derive(Clone,Debug,PartialEq)]
pub struct ScriptCommand {
    program:String,
    args:Vec<(String,Option<String>)>,
}

/// double quote a value for the shell, escaping the characters that stay special inside quotes
pub fn shell_quote(value:&str) -> String {
    let mut quoted = String::with_capacity(value.len()+2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c,'"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

impl ScriptCommand {
    pub fn new(program:impl AsRef<Path>) -> Self {
        Self {
            program:program.as_ref().display().to_string(),
            args:vec![],
        }
    }

    pub fn arg(mut self,flag:&str,value:impl std::fmt::Display) -> Self {
        self.args.push((flag.to_string(),Some(value.to_string())));
        self
    }

    pub fn opt_arg(self,flag:&str,value:Option<impl std::fmt::Display>) -> Self {
        match value {
            Some(v) => self.arg(flag,v),
            None => self
        }
    }

    pub fn flag(mut self,flag:&str) -> Self {
        self.args.push((flag.to_string(),None));
        self
    }

    /// bare word such as a subcommand name, placed after any arguments already added
    pub fn positional(self,word:&str) -> Self {
        self.flag(word)
    }

    pub fn print(&self) -> String {
        let mut lines = vec![shell_quote(&self.program)];
        lines.extend(self.args.iter().map(|(flag,value)| match value {
            Some(v) => format!("  {}={}",flag,shell_quote(v)),
            None => format!("  {}",flag),
        }));
        lines.join(" \\\n")
    }
}

#[derive(Clone,Debug)]
pub struct BatchScript {
    preamble:String,
    pub options:PbsOpts,
    pub commands:Vec<String>,
}

impl BatchScript {
    pub fn new(options:PbsOpts) -> BatchScript {
        BatchScript {
            preamble:"#!/usr/bin/env bash".to_string(),
            options,
            commands:vec![String::from("hostname")],
        }
    }

    pub fn push(&mut self,command:&ScriptCommand) {
        self.commands.push(command.print());
    }

    pub fn push_line(&mut self,line:&str) {
        self.commands.push(line.to_string());
    }

    pub fn commands(&self) -> String {
        self.commands.join("\n")
    }

    pub fn print(&self) -> String {
        let mut elems = Vec::<String>::new();
        elems.push(self.preamble.clone());
        elems.push(self.options.print());
        elems.push(String::new());
        elems.push(self.commands());
        let mut s = elems.join("\n");
        s.push('\n');
        s
    }

    /// write the script into `location`, replacing a previous version of it
    pub fn write(&self,location:&Path,file_name:&str) -> Result<PathBuf> {
        let fname = location.join(file_name);
        let err = |source| PbsError::Write { path:fname.clone(), source };
        if fname.exists() {
            fs::remove_file(&fname).map_err(err)?;
        }
        let mut f = File::create(&fname).map_err(err)?;
        f.write_all(self.print().as_bytes()).map_err(err)?;
        fs::set_permissions(&fname,fs::Permissions::from_mode(SCRIPT_MODE)).map_err(err)?;
        tracing::debug!("wrote batch script {:?}",fname);
        Ok(fname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives(){
        let mut o = PbsOpts::new(36).output_to(Path::new("/build/wd"));
        o.mem_gb = Some(12);
        o.vmem_gb = Some(16);
        o.job_name = Some(String::from("102311.rfMRI_REST1_7T_PA.IcaFixProcessingHCP7T"));
        assert_eq!(o.print(),
            "#PBS -N 102311.rfMRI_REST1_7T_PA.IcaFixProcessingHCP7T\n\
             #PBS -l nodes=1:ppn=1,walltime=36:00:00,mem=12gb,vmem=16gb\n\
             #PBS -o /build/wd\n\
             #PBS -e /build/wd");
    }

    #[test]
    fn command_with_named_flags(){
        let c = ScriptCommand::new("/pipelines/IcaFix.XNAT.sh")
            .arg("--subject","102311")
            .arg("--password","pa$$\"word")
            .opt_arg("--setup-script",None::<String>)
            .flag("--clean-output-resource-first");
        assert_eq!(c.print(),
            "\"/pipelines/IcaFix.XNAT.sh\" \\\n  --subject=\"102311\" \\\n  --password=\"pa\\$\\$\\\"word\" \\\n  --clean-output-resource-first");
    }

    #[test]
    fn program_path_with_spaces_stays_one_word(){
        let c = ScriptCommand::new("/opt/xnat pbs/bin/xnat_pbs_jobs")
            .positional("get-cinab-data")
            .arg("--project","HCP_Staging_7T");
        assert_eq!(c.print(),
            "\"/opt/xnat pbs/bin/xnat_pbs_jobs\" \\\n  get-cinab-data \\\n  --project=\"HCP_Staging_7T\"");
    }

    #[test]
    fn write_replaces_and_sets_mode(){
        let dir = tempfile::tempdir().unwrap();
        let mut b = BatchScript::new(PbsOpts::new(4));
        std::fs::write(dir.path().join("a.sh"),"stale").unwrap();
        b.push_line("echo done");
        let p = b.write(dir.path(),"a.sh").unwrap();
        let text = std::fs::read_to_string(&p).unwrap();
        assert!(text.starts_with("#!/usr/bin/env bash\n#PBS -l nodes=1:ppn=1,walltime=4:00:00\n"));
        assert!(text.ends_with("hostname\necho done\n"));
        let mode = std::fs::metadata(&p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode,SCRIPT_MODE);
    }
}
