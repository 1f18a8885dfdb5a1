use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::Error as SmtpError;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::debug;
use thiserror::Error;

use crate::config::MailConfig;

const SMTP_RELAY: &str = "smtp.gmail.com";
const PROGRAM_NAME: &str = "AI 물리 학습";

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid mail address {address}: {source}")]
    Address {
        address: String,
        source: lettre::address::AddressError,
    },
    #[error("failed to assemble the mail message: {0}")]
    Compose(#[from] lettre::error::Error),
    #[error("mail authentication failed; check EMAIL_ADDRESS and the app password in EMAIL_PASSWORD")]
    AuthFailed(#[source] SmtpError),
    #[error("failed to send mail: {0}")]
    Transport(#[source] SmtpError),
}

pub struct Mailer {
    sender: String,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl Mailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(SMTP_RELAY)
            .map_err(MailError::Transport)?
            .credentials(Credentials::new(
                config.sender.clone(),
                config.password.clone(),
            ))
            .build();
        Ok(Self {
            sender: config.sender.clone(),
            transport,
        })
    }

    /// Sends the rendered HTML record as the single alternative part of a
    /// multipart message. One-shot: a failed send is reported, never retried.
    pub async fn send(
        &self,
        recipient: &str,
        student_name: &str,
        html_body: String,
    ) -> Result<(), MailError> {
        let message = Message::builder()
            .from(parse_mailbox(&self.sender)?)
            .to(parse_mailbox(recipient)?)
            .subject(subject_for(student_name))
            .multipart(MultiPart::alternative().singlepart(SinglePart::html(html_body)))?;

        debug!("sending conversation record to {recipient}");
        self.transport
            .send(message)
            .await
            .map_err(classify_send_error)?;
        Ok(())
    }
}

pub fn subject_for(student_name: &str) -> String {
    format!("[{PROGRAM_NAME}] {student_name} 학생의 전체 대화 기록입니다.")
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|source| MailError::Address {
        address: address.to_string(),
        source,
    })
}

fn classify_send_error(err: SmtpError) -> MailError {
    // 535 is the relay's authentication-rejected reply
    let auth_rejected = err
        .status()
        .map(|code| code.to_string() == "535")
        .unwrap_or(false);
    if auth_rejected {
        MailError::AuthFailed(err)
    } else {
        MailError::Transport(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_names_the_program_and_student() {
        let subject = subject_for("김민준");
        assert_eq!(subject, "[AI 물리 학습] 김민준 학생의 전체 대화 기록입니다.");
    }

    #[test]
    fn bad_addresses_are_rejected_before_sending() {
        let result = parse_mailbox("not an address");
        assert!(matches!(result, Err(MailError::Address { .. })));
    }
}
