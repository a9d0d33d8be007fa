/// All localized user-facing strings for a language.
///
/// Fields are grouped the way keys are namespaced (`common.*`, `auth.*`,
/// `shell.*`); [`LanguageStrings::get`] resolves a dotted key to a field.
#[derive(Debug, Clone)]
pub struct LanguageStrings {
    // ==================== Common ====================
    pub welcome: &'static str,
    pub dashboard: &'static str,
    pub trading: &'static str,
    pub portfolio: &'static str,
    pub analytics: &'static str,
    pub tokenization: &'static str,
    pub grievances: &'static str,
    pub assistant: &'static str,
    pub documents: &'static str,
    pub settings: &'static str,
    pub login: &'static str,
    pub logout: &'static str,
    pub register: &'static str,
    pub loading: &'static str,
    pub language: &'static str,

    // ==================== Auth ====================
    pub sign_in: &'static str,
    pub sign_up: &'static str,
    pub sign_out: &'static str,
    pub check_email: &'static str,
    pub sign_in_success: &'static str,
    pub sign_out_success: &'static str,

    // ==================== Shell ====================
    /// Command overview shown by /help
    pub help: &'static str,

    /// Placeholders: {language}
    pub language_changed: &'static str,

    /// Placeholders: {current}, {options}
    pub language_settings: &'static str,

    /// Placeholders: {options}
    pub language_invalid: &'static str,

    /// Appended when the profile could not be updated remotely
    pub language_sync_failed: &'static str,

    /// Placeholders: {email}, {language}
    pub status_signed_in: &'static str,

    pub status_signed_out: &'static str,

    /// Placeholders: {error}
    pub auth_failed: &'static str,

    /// Placeholders: {path}
    pub redirect_login: &'static str,

    /// Placeholders: {page}
    pub navigated: &'static str,

    /// Placeholders: {path}
    pub not_found: &'static str,

    pub usage_login: &'static str,
    pub usage_register: &'static str,
    pub usage_go: &'static str,
    pub unknown_command: &'static str,
}

impl LanguageStrings {
    /// Resolve a dotted key (`common.dashboard`, `auth.signIn`, ...).
    pub fn get(&self, key: &str) -> Option<&'static str> {
        let value = match key {
            "common.welcome" => self.welcome,
            "common.dashboard" => self.dashboard,
            "common.trading" => self.trading,
            "common.portfolio" => self.portfolio,
            "common.analytics" => self.analytics,
            "common.tokenization" => self.tokenization,
            "common.grievances" => self.grievances,
            "common.assistant" => self.assistant,
            "common.documents" => self.documents,
            "common.settings" => self.settings,
            "common.login" => self.login,
            "common.logout" => self.logout,
            "common.register" => self.register,
            "common.loading" => self.loading,
            "common.language" => self.language,
            "auth.signIn" => self.sign_in,
            "auth.signUp" => self.sign_up,
            "auth.signOut" => self.sign_out,
            "auth.checkEmail" => self.check_email,
            "auth.signInSuccess" => self.sign_in_success,
            "auth.signOutSuccess" => self.sign_out_success,
            "shell.help" => self.help,
            "shell.languageChanged" => self.language_changed,
            "shell.languageSettings" => self.language_settings,
            "shell.languageInvalid" => self.language_invalid,
            "shell.languageSyncFailed" => self.language_sync_failed,
            "shell.statusSignedIn" => self.status_signed_in,
            "shell.statusSignedOut" => self.status_signed_out,
            "shell.authFailed" => self.auth_failed,
            "shell.redirectLogin" => self.redirect_login,
            "shell.navigated" => self.navigated,
            "shell.notFound" => self.not_found,
            "shell.usageLogin" => self.usage_login,
            "shell.usageRegister" => self.usage_register,
            "shell.usageGo" => self.usage_go,
            "shell.unknownCommand" => self.unknown_command,
            _ => return None,
        };
        // Empty entries count as missing so the engine falls back
        (!value.is_empty()).then_some(value)
    }
}

// ==================== English Strings ====================

pub const ENGLISH_STRINGS: LanguageStrings = LanguageStrings {
    welcome: "Welcome",
    dashboard: "Dashboard",
    trading: "Trading",
    portfolio: "Portfolio",
    analytics: "Analytics",
    tokenization: "Tokenization",
    grievances: "Grievances",
    assistant: "AI Assistant",
    documents: "Documents",
    settings: "Settings",
    login: "Login",
    logout: "Logout",
    register: "Register",
    loading: "Loading...",
    language: "Language",

    sign_in: "Sign In",
    sign_up: "Sign Up",
    sign_out: "Sign Out",
    check_email: "Please check your email to confirm your account",
    sign_in_success: "Signed in successfully",
    sign_out_success: "Signed out successfully",

    help: "Commands:\n\
/login <email> <password> - Sign in\n\
/register <email> <password> <full name> - Create an account\n\
/logout - Sign out\n\
/language [code] - Show or change the language\n\
/go <path> - Open a page\n\
/status - Show who is signed in",
    language_changed: "Language changed to {language}",
    language_settings: "Current language: {current}\nAvailable: {options}",
    language_invalid: "Invalid language. Available options: {options}",
    language_sync_failed: "(Your profile could not be updated; the change applies on this device only.)",
    status_signed_in: "Signed in as {email}\nLanguage: {language}",
    status_signed_out: "You are not signed in",
    auth_failed: "Authentication failed: {error}",
    redirect_login: "Please sign in to open {path}",
    navigated: "Opened {page}",
    not_found: "Page not found: {path}",
    usage_login: "Usage: /login <email> <password>",
    usage_register: "Usage: /register <email> <password> <full name>",
    usage_go: "Usage: /go <path>",
    unknown_command: "Unknown command. Use /help to see available commands.",
};

// ==================== Hindi Strings ====================

pub const HINDI_STRINGS: LanguageStrings = LanguageStrings {
    welcome: "स्वागत",
    dashboard: "डैशबोर्ड",
    trading: "ट्रेडिंग",
    portfolio: "पोर्टफोलियो",
    analytics: "एनालिटिक्स",
    tokenization: "टोकनाइज़ेशन",
    grievances: "शिकायतें",
    assistant: "AI सहायक",
    documents: "दस्तावेज़",
    settings: "सेटिंग्स",
    login: "लॉगिन",
    logout: "लॉगआउट",
    register: "रजिस्टर",
    loading: "लोड हो रहा है...",
    language: "भाषा",

    sign_in: "साइन इन",
    sign_up: "साइन अप",
    sign_out: "साइन आउट",
    check_email: "कृपया अपना खाता सत्यापित करने के लिए अपना ईमेल देखें",
    sign_in_success: "सफलतापूर्वक साइन इन",
    sign_out_success: "सफलतापूर्वक साइन आउट",

    help: "कमांड:\n\
/login <email> <password> - साइन इन करें\n\
/register <email> <password> <पूरा नाम> - खाता बनाएं\n\
/logout - साइन आउट करें\n\
/language [code] - भाषा देखें या बदलें\n\
/go <path> - पेज खोलें\n\
/status - देखें कौन साइन इन है",
    language_changed: "भाषा बदलकर {language} कर दी गई",
    language_settings: "वर्तमान भाषा: {current}\nउपलब्ध: {options}",
    language_invalid: "अमान्य भाषा। उपलब्ध विकल्प: {options}",
    language_sync_failed: "(आपकी प्रोफ़ाइल अपडेट नहीं हो सकी; बदलाव केवल इस डिवाइस पर लागू है।)",
    status_signed_in: "{email} के रूप में साइन इन\nभाषा: {language}",
    status_signed_out: "आप साइन इन नहीं हैं",
    auth_failed: "प्रमाणीकरण विफल: {error}",
    redirect_login: "{path} खोलने के लिए कृपया साइन इन करें",
    navigated: "{page} खोला गया",
    not_found: "पेज नहीं मिला: {path}",
    usage_login: "उपयोग: /login <email> <password>",
    usage_register: "उपयोग: /register <email> <password> <पूरा नाम>",
    usage_go: "उपयोग: /go <path>",
    unknown_command: "अज्ञात कमांड। उपलब्ध कमांड देखने के लिए /help का उपयोग करें।",
};

// ==================== Telugu Strings ====================

pub const TELUGU_STRINGS: LanguageStrings = LanguageStrings {
    welcome: "స్వాగతం",
    dashboard: "డాష్‌బోర్డ్",
    trading: "ట్రేడింగ్",
    portfolio: "పోర్ట్‌ఫోలియో",
    analytics: "అనలిటిక్స్",
    tokenization: "టోకనైజేషన్",
    grievances: "ఫిర్యాదులు",
    assistant: "AI సహాయకుడు",
    documents: "డాక్యుమెంట్లు",
    settings: "సెట్టింగ్స్",
    login: "లాగిన్",
    logout: "లాగౌట్",
    register: "రిజిస్టర్",
    loading: "లోడవుతోంది...",
    language: "భాష",

    sign_in: "సైన్ ఇన్",
    sign_up: "సైన్ అప్",
    sign_out: "సైన్ అవుట్",
    check_email: "మీ ఖాతాను నిర్ధారించడానికి దయచేసి మీ ఇమెయిల్‌ను చూడండి",
    sign_in_success: "విజయవంతంగా సైన్ ఇన్ అయ్యారు",
    sign_out_success: "విజయవంతంగా సైన్ అవుట్ అయ్యారు",

    help: "కమాండ్లు:\n\
/login <email> <password> - సైన్ ఇన్ చేయండి\n\
/register <email> <password> <పూర్తి పేరు> - ఖాతా సృష్టించండి\n\
/logout - సైన్ అవుట్ చేయండి\n\
/language [code] - భాషను చూడండి లేదా మార్చండి\n\
/go <path> - పేజీని తెరవండి\n\
/status - ఎవరు సైన్ ఇన్ అయ్యారో చూడండి",
    language_changed: "భాష {language}కి మార్చబడింది",
    language_settings: "ప్రస్తుత భాష: {current}\nఅందుబాటులో ఉన్నవి: {options}",
    language_invalid: "చెల్లని భాష. అందుబాటులో ఉన్న ఎంపికలు: {options}",
    language_sync_failed: "(మీ ప్రొఫైల్ నవీకరించబడలేదు; మార్పు ఈ పరికరంలో మాత్రమే వర్తిస్తుంది.)",
    status_signed_in: "{email}గా సైన్ ఇన్ అయ్యారు\nభాష: {language}",
    status_signed_out: "మీరు సైన్ ఇన్ కాలేదు",
    auth_failed: "ప్రామాణీకరణ విఫలమైంది: {error}",
    redirect_login: "{path} తెరవడానికి దయచేసి సైన్ ఇన్ చేయండి",
    navigated: "{page} తెరవబడింది",
    not_found: "పేజీ కనుగొనబడలేదు: {path}",
    usage_login: "వాడుక: /login <email> <password>",
    usage_register: "వాడుక: /register <email> <password> <పూర్తి పేరు>",
    usage_go: "వాడుక: /go <path>",
    unknown_command: "తెలియని కమాండ్. అందుబాటులో ఉన్న కమాండ్లను చూడటానికి /help ఉపయోగించండి.",
};
