use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::debug;

use crate::config::{SmtpConfig, SmtpSecurity};

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_html(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let builder = match cfg.security {
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)
                .with_context(|| format!("smtp relay {}", cfg.host))?,
            SmtpSecurity::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
                    .with_context(|| format!("smtp starttls relay {}", cfg.host))?
            }
            SmtpSecurity::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&cfg.host)
            }
        };
        debug!(host = %cfg.host, port = cfg.port, security = ?cfg.security, "smtp transport");
        let transport = builder
            .port(cfg.port)
            .credentials(Credentials::new(cfg.user.clone(), cfg.password.clone()))
            .build();
        Ok(Self {
            transport,
            from: cfg.from_email.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_html(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()> {
        let email = Message::builder()
            .from(self.from.parse().context("parse sender address")?)
            .to(to.parse().context("parse recipient address")?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())
            .context("build email")?;
        self.transport.send(email).await.context("smtp send")?;
        debug!(to, subject, "email sent");
        Ok(())
    }
}

/// Used when the SMTP variables are incomplete: every send fails.
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send_html(&self, _to: &str, _subject: &str, _html: &str) -> anyhow::Result<()> {
        anyhow::bail!("smtp configuration is incomplete")
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn verification_email(name: &str, link: &str) -> (String, String) {
    let subject = format!("Verificación de cuenta - {}", name);
    let name = escape_html(name);
    let link = escape_html(link);
    let html = format!(
        "<h1>Verificación de cuenta</h1>\
         Hola {name},<br><br>\
         Para verificar su cuenta haga click en el siguiente enlace:<br>\
         <a href='{link}'>{link}</a><br><br>\
         O copia y pega el siguiente enlace en tu navegador:<br>\
         {link}<br><br>\
         Gracias por registrarse."
    );
    (subject, html)
}

pub fn contact_email(name: &str, email: &str, phone: &str, message: &str) -> (String, String) {
    let subject = format!("Nuevo mensaje de contacto - {}", name);
    let html = format!(
        "<h1>Nuevo mensaje de contacto</h1>\
         <p>Se ha recibido un nuevo mensaje desde el formulario de contacto:</p>\
         <ul>\
         <li><strong>Nombre:</strong> {}</li>\
         <li><strong>Email:</strong> {}</li>\
         <li><strong>Teléfono:</strong> {}</li>\
         <li><strong>Mensaje:</strong> {}</li>\
         </ul>",
        escape_html(name),
        escape_html(email),
        escape_html(phone),
        escape_html(message),
    );
    (subject, html)
}
