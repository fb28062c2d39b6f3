//! Client device classification from the `User-Agent` header.

/// Japanese feature-phone carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Carrier {
    DoCoMo,
    Au,
    SoftBank,
}

/// Kind of browser making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientDevice {
    /// Desktop browser.
    #[default]
    Pc,
    /// Touch smartphone browser.
    Smartphone,
    /// Carrier feature phone.
    Mobile(Carrier),
}

impl ClientDevice {
    /// Classify a `User-Agent` string.
    #[must_use]
    pub fn from_user_agent(user_agent: &str) -> Self {
        if user_agent.starts_with("DoCoMo/") {
            return Self::Mobile(Carrier::DoCoMo);
        }
        if user_agent.starts_with("KDDI-") || user_agent.starts_with("UP.Browser") {
            return Self::Mobile(Carrier::Au);
        }
        if ["SoftBank", "Vodafone", "J-PHONE", "MOT-"]
            .iter()
            .any(|prefix| user_agent.starts_with(prefix))
        {
            return Self::Mobile(Carrier::SoftBank);
        }
        if ["iPhone", "iPod", "Android", "Windows Phone"]
            .iter()
            .any(|marker| user_agent.contains(marker))
        {
            return Self::Smartphone;
        }
        Self::Pc
    }

    /// Whether the device is a carrier feature phone.
    #[must_use]
    pub fn is_mobile(self) -> bool {
        matches!(self, Self::Mobile(_))
    }

    #[must_use]
    pub fn is_smartphone(self) -> bool {
        self == Self::Smartphone
    }

    #[must_use]
    pub fn is_docomo(self) -> bool {
        self == Self::Mobile(Carrier::DoCoMo)
    }
}
