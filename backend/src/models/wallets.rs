use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Label partitioning hot wallets by the feature they serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WalletPurpose {
    MainAirdrop,
    LinkMiniapp,
    LikesRecasts,
    LinkWeb,
    General,
}

impl WalletPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletPurpose::MainAirdrop => "main-airdrop",
            WalletPurpose::LinkMiniapp => "link-miniapp",
            WalletPurpose::LikesRecasts => "likes-recasts",
            WalletPurpose::LinkWeb => "link-web",
            WalletPurpose::General => "general",
        }
    }
}

impl fmt::Display for WalletPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WalletPurpose {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "main-airdrop" => Ok(WalletPurpose::MainAirdrop),
            "link-miniapp" => Ok(WalletPurpose::LinkMiniapp),
            "likes-recasts" => Ok(WalletPurpose::LikesRecasts),
            "link-web" => Ok(WalletPurpose::LinkWeb),
            "general" => Ok(WalletPurpose::General),
            other => Err(anyhow::anyhow!("Unknown wallet purpose '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purpose_parse_matches_display() {
        for purpose in [
            WalletPurpose::MainAirdrop,
            WalletPurpose::LinkMiniapp,
            WalletPurpose::LikesRecasts,
            WalletPurpose::LinkWeb,
            WalletPurpose::General,
        ] {
            assert_eq!(purpose.to_string().parse::<WalletPurpose>().unwrap(), purpose);
        }
        assert_eq!(" Likes-Recasts ".parse::<WalletPurpose>().unwrap(), WalletPurpose::LikesRecasts);
        assert!("treasury".parse::<WalletPurpose>().is_err());
    }

    #[test]
    fn test_purpose_serde_is_kebab_case() {
        let json = serde_json::to_string(&WalletPurpose::MainAirdrop).unwrap();
        assert_eq!(json, "\"main-airdrop\"");
    }
}
