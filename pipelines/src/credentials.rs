use std::fmt;
use std::io::{self, BufRead, Write};

pub const USER_VAR:&str = "XNAT_PBS_JOBS_USER";
pub const PASSWORD_VAR:&str = "XNAT_PBS_JOBS_PASSWORD";

pub const USERNAME_PROMPT:&str = "DB Username: ";
pub const PASSWORD_PROMPT:&str = "DB Password: ";

/// Database login written into the generated job scripts
#[derive(Clone,PartialEq,Eq)]
pub struct Credentials {
    pub username:String,
    password:String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username",&self.username)
            .field("password",&"********")
            .finish()
    }
}

fn prompt_line(prompt:&str,input:&mut dyn BufRead,output:&mut dyn Write) -> io::Result<String> {
    write!(output,"{}",prompt)?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    utils::trim_newline(&mut line);
    Ok(line)
}

impl Credentials {
    pub fn new(username:&str,password:&str) -> Self {
        Self { username:username.to_string(), password:password.to_string() }
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn from_env() -> Option<Self> {
        match (std::env::var(USER_VAR),std::env::var(PASSWORD_VAR)) {
            (Ok(u),Ok(p)) => Some(Self::new(&u,&p)),
            _ => None
        }
    }

    /// Ask for the username on `input`. The password is obtained from `read_password`,
    /// which is handed the password prompt.
    pub fn prompt_with<F>(input:&mut dyn BufRead,output:&mut dyn Write,read_password:F) -> io::Result<Self>
    where F: FnOnce(&str) -> io::Result<String> {
        let username = prompt_line(USERNAME_PROMPT,input,output)?;
        let password = read_password(PASSWORD_PROMPT)?;
        Ok(Self { username, password })
    }

    /// both answers read from `input`, for non-interactive use
    pub fn prompt(input:&mut dyn BufRead,output:&mut dyn Write) -> io::Result<Self> {
        let username = prompt_line(USERNAME_PROMPT,input,output)?;
        let password = prompt_line(PASSWORD_PROMPT,input,output)?;
        Ok(Self { username, password })
    }

    /// username from stdin, password from the terminal without echo
    pub fn from_env_or_prompt() -> io::Result<Self> {
        match Self::from_env() {
            Some(c) => Ok(c),
            None => {
                let stdin = io::stdin();
                Self::prompt_with(&mut stdin.lock(),&mut io::stdout(),|p| rpassword::prompt_password(p))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_for_user_then_password(){
        let mut input = io::Cursor::new(b"hcpuser\nsecret\n".to_vec());
        let mut output = Vec::<u8>::new();
        let c = Credentials::prompt(&mut input,&mut output).unwrap();
        assert_eq!(c.username,"hcpuser");
        assert_eq!(c.password(),"secret");
        assert_eq!(String::from_utf8(output).unwrap(),"DB Username: DB Password: ");
    }

    #[test]
    fn password_comes_from_the_hidden_reader(){
        let mut input = io::Cursor::new(b"hcpuser\nnot-the-password\n".to_vec());
        let mut output = Vec::<u8>::new();
        let mut asked = String::new();
        let c = Credentials::prompt_with(&mut input,&mut output,|p| {
            asked = p.to_string();
            Ok(String::from("secret"))
        }).unwrap();
        assert_eq!(c.username,"hcpuser");
        assert_eq!(c.password(),"secret");
        assert_eq!(asked,PASSWORD_PROMPT);
        assert_eq!(String::from_utf8(output).unwrap(),USERNAME_PROMPT);
    }

    #[test]
    fn debug_hides_password(){
        let c = Credentials::new("hcpuser","secret");
        let d = format!("{:?}",c);
        assert!(d.contains("hcpuser"));
        assert!(!d.contains("secret"));
    }
}
