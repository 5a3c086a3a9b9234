use reqwest::IntoUrl;
use reqwest::Url;
use serde::{de::Visitor, Deserialize};

#[derive(Clone, Debug)]
pub struct UdpUrl(Url);
#[derive(Clone, Debug)]
pub struct HttpUrl(Url);

#[derive(Debug, Clone)]
pub enum TrackerUrl {
    Http(HttpUrl),
    Udp(UdpUrl),
}

impl AsRef<str> for HttpUrl {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl AsRef<str> for UdpUrl {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl HttpUrl {
    pub fn into_inner(self) -> Url {
        self.0
    }
}

impl UdpUrl {
    pub fn into_inner(self) -> Url {
        self.0
    }
}

impl From<HttpUrl> for Url {
    fn from(value: HttpUrl) -> Self {
        value.into_inner()
    }
}

impl From<UdpUrl> for Url {
    fn from(value: UdpUrl) -> Self {
        value.into_inner()
    }
}

impl TrackerUrl {
    pub(crate) fn new(url: impl IntoUrl) -> anyhow::Result<Self> {
        let url = url.into_url()?;
        Ok(match url.scheme() {
            "http" | "https" => Self::Http(HttpUrl(url)),
            "udp" => Self::Udp(UdpUrl(url)),
            scheme => anyhow::bail!(format!("unsupported scheme {:?} for tracker", scheme)),
        })
    }

    /// `true` if this tracker is reachable only over IPv6 — either the host
    /// is an IPv6 literal or the URL contains the substring "ipv6", matching
    /// the filter the program this spec distills from applies to
    /// `announce-list` entries.
    pub fn looks_like_ipv6(&self) -> bool {
        let url = match self {
            Self::Http(u) => &u.0,
            Self::Udp(u) => &u.0,
        };
        let host_is_ipv6 = url.host_str().is_some_and(|h| h.contains(':'));
        host_is_ipv6 || url.as_str().contains("ipv6")
    }
}

impl<'a> Deserialize<'a> for TrackerUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'a>,
    {
        deserializer.deserialize_string(TrackerUrlVisitor)
    }
}

struct TrackerUrlVisitor;
impl<'a> Visitor<'a> for TrackerUrlVisitor {
    type Value = TrackerUrl;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("string url using udp or http scheme")
    }

    // this is what serde_bencode calls for deserializing str.
    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        self.visit_string(v.to_owned())
    }

    fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        TrackerUrl::new(v).map_err(serde::de::Error::custom)
    }
}
