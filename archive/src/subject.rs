use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use crate::error::{ArchiveError, Result};

pub const DEFAULT_SEPARATOR:char = ':';

/// Identifies one unit of work in the archive
#[derive(Clone,Debug,PartialEq,Eq,Hash)]
pub struct SubjectInfo {
    pub project:String,
    pub subject_id:String,
    pub structural_reference_project:Option<String>,
    pub classifier:Option<String>,
    pub extra:Option<String>,
}

impl SubjectInfo {
    pub fn new(project:&str,subject_id:&str) -> Self {
        Self {
            project:project.to_string(),
            subject_id:subject_id.to_string(),
            structural_reference_project:None,
            classifier:None,
            extra:None,
        }
    }

    pub fn with_reference_project(mut self,project:&str) -> Self {
        self.structural_reference_project = Some(project.to_string());
        self
    }

    pub fn with_classifier(mut self,classifier:&str) -> Self {
        self.classifier = Some(classifier.to_string());
        self
    }

    pub fn with_extra(mut self,extra:&str) -> Self {
        self.extra = Some(extra.to_string());
        self
    }
}

impl fmt::Display for SubjectInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,"{}",self.project)?;
        if let Some(r) = &self.structural_reference_project {
            write!(f,":{}",r)?;
        }
        write!(f,":{}",self.subject_id)?;
        if let Some(c) = &self.classifier {
            write!(f,":{}",c)?;
        }
        if let Some(e) = &self.extra {
            write!(f,":{}",e)?;
        }
        Ok(())
    }
}

/// Field order of a subject list line
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum SubjectListLayout {
    /// project, subject, classifier, optional extra
    Ccf,
    /// project, subject, optional extra
    Hcp3T,
    /// project, structural reference project, subject, optional extra
    Hcp7T,
}

impl SubjectListLayout {
    fn required_fields(&self) -> usize {
        match self {
            SubjectListLayout::Ccf => 3,
            SubjectListLayout::Hcp3T => 2,
            SubjectListLayout::Hcp7T => 3,
        }
    }

    pub fn parse_line(&self,line:&str,separator:char,line_number:usize) -> Result<SubjectInfo> {
        let fields:Vec<&str> = line.split(separator).map(|f| f.trim()).collect();
        let malformed = || ArchiveError::MalformedSubjectLine { line_number, line:line.to_string() };
        if fields.len() < self.required_fields() || fields[..self.required_fields()].iter().any(|f| f.is_empty()) {
            return Err(malformed())
        }
        let optional = |index:usize| fields.get(index).filter(|f| !f.is_empty()).map(|f| f.to_string());
        let subject = match self {
            SubjectListLayout::Ccf => SubjectInfo {
                project:fields[0].to_string(),
                subject_id:fields[1].to_string(),
                structural_reference_project:None,
                classifier:Some(fields[2].to_string()),
                extra:optional(3),
            },
            SubjectListLayout::Hcp3T => SubjectInfo {
                project:fields[0].to_string(),
                subject_id:fields[1].to_string(),
                structural_reference_project:None,
                classifier:None,
                extra:optional(2),
            },
            SubjectListLayout::Hcp7T => SubjectInfo {
                project:fields[0].to_string(),
                subject_id:fields[2].to_string(),
                structural_reference_project:Some(fields[1].to_string()),
                classifier:None,
                extra:optional(3),
            },
        };
        Ok(subject)
    }
}

/// Read a subject list file, one subject per line. Blank lines and lines starting with '#' are ignored.
pub fn read_subject_info_list(path:&Path,separator:char,layout:SubjectListLayout) -> Result<Vec<SubjectInfo>> {
    if !path.is_file() {
        return Err(ArchiveError::SubjectFileNotFound(path.to_owned()))
    }
    let f = File::open(path).map_err(|e| ArchiveError::io(path,e))?;
    let mut subjects = Vec::<SubjectInfo>::new();
    for (index,line) in BufReader::new(f).lines().enumerate() {
        let line = line.map_err(|e| ArchiveError::io(path,e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue
        }
        subjects.push(layout.parse_line(trimmed,separator,index+1)?);
    }
    tracing::debug!("read {} subjects from {:?}",subjects.len(),path);
    Ok(subjects)
}
