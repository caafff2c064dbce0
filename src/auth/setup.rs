//! Interactive creation of a config file

use std::io::{self, BufRead, Write};
use std::path::Path;

use crate::config::{ConfigFile, Credentials};
use crate::error::ConfigError;

fn prompt<R, W>(input: &mut R, output: &mut W, label: &str) -> io::Result<String>
where
    R: BufRead,
    W: Write,
{
    write!(output, "{}: ", label)?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Ask for username, password, client id and client secret, in that order.
/// Input is taken verbatim; nothing is validated.
pub fn prompt_credentials<R: BufRead, W: Write>(
    mut input: R,
    mut output: W,
    auth_url: &str,
) -> io::Result<Credentials> {
    writeln!(output, "Please provide the following information.")?;
    let username = prompt(&mut input, &mut output, "username")?;
    let password = prompt(&mut input, &mut output, "password")?;
    let client_id = prompt(&mut input, &mut output, "client_id")?;
    let client_secret = prompt(&mut input, &mut output, "client_secret")?;

    Ok(Credentials {
        client_id,
        client_secret,
        username,
        password,
        auth_url: auth_url.to_string(),
    })
}

/// Write a fresh config file holding only `credentials`, replacing any
/// existing file (and with it any stored token).
pub fn write_config(path: &Path, credentials: &Credentials) -> Result<(), ConfigError> {
    ConfigFile::with_credentials(credentials)?.save(path)?;
    tracing::info!("Wrote credentials to {}", path.display());
    Ok(())
}
