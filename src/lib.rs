pub mod cli;
pub mod html;
pub mod smtp;

pub use smtp::{
    send_mail, send_mail_with, AddressInput, AddressList, Mail, MailError, MailResult, SendReport,
    TransportConfig, TransportOptions,
};
