#[derive(clap::Parser, Debug)]
#[clap(author, version, about, long_about = None)]
#[clap(arg_required_else_help = true)]
pub struct Args {
    /// Hostname of the XMPP server
    #[clap(long)]
    pub hostname: String,

    /// Port of the XMPP server
    #[clap(long, default_value_t = 5222)]
    pub port: u16,

    /// XMPP domain when it differs from the hostname
    #[clap(long)]
    pub service_name: Option<String>,

    /// Username to connect with, e.g. 'user' of the JID 'user@example.com'
    #[clap(short, long)]
    pub username: String,

    /// Password to connect with
    #[clap(short, long)]
    pub password: String,

    /// Recipient address, or a room address with the 'muc:' prefix
    #[clap(short, long)]
    pub recipient: String,

    /// Nickname to use in rooms
    #[clap(long, default_value = "relay")]
    pub resource: String,

    /// Message format; field names in braces are substituted
    #[clap(long, default_value = "{source} {message}")]
    pub format: String,

    /// Force encryption for the server connection
    #[clap(long)]
    pub require_security: bool,

    /// Do not enforce full validation of the certificate chain
    #[clap(long)]
    pub accept_selfsigned: bool,

    /// Node identifier used as the login resource
    #[clap(long)]
    pub node_id: Option<String>,

    /// Enable verbose informational messages
    #[clap(long)]
    pub verbose: bool,
}

impl Args {
    pub fn node_id(&self) -> String {
        self.node_id
            .clone()
            .unwrap_or_else(|| format!("stdin-relay-{}", std::process::id()))
    }
}
