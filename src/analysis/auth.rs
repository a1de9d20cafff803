use std::sync::OnceLock;

use regex::{Regex, RegexSet};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::events::{self, ToastKind, LOGIN_ROUTE};

use super::{
    contract::{
        ApiClient, FlowNotices, FormSlot, Notice, CHECK_USER, FORGOT_PASSWORD, GOOGLE_LOGIN,
        GOOGLE_SIGNUP, LOGIN, REGISTER, RESET_PASSWORD,
    },
    AnalysisError,
};

pub const PROFILE_ROUTE: &str = "/profile";
pub const GOOGLE_SIGNUP_ROUTE: &str = "/google-signup";

const USERS_AVAILABLE: &str = "Username and email are available";

const LOGIN_NOTICES: FlowNotices = FlowNotices::new("Login failed. Please check your credentials.")
    .unauthorized(Notice::error("Login failed. Please check your credentials."));
const REGISTER_NOTICES: FlowNotices =
    FlowNotices::new("Failed to register, please try again.").prefer_detail();
const GOOGLE_LOGIN_NOTICES: FlowNotices = FlowNotices::new("Authentication failed")
    .unauthorized(Notice::warning("Google User does not exist. Signing up now..."));
const GOOGLE_SIGNUP_NOTICES: FlowNotices =
    FlowNotices::new("Failed to sign up with Google").prefer_detail();
const FORGOT_NOTICES: FlowNotices =
    FlowNotices::new("Failed to send password reset link. Please try again.")
        .not_found("User does not exist with this email. Please sign up.");
const RESET_NOTICES: FlowNotices = FlowNotices::new("Password reset failed. Please try again.");

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GoogleLoginOutcome {
    SignedIn,
    /// No account for this Google user yet; the shell moved to the signup form.
    SignupRequired,
}

#[derive(Serialize)]
struct Credentials<'a> {
    credential: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default, alias = "user_info")]
    user: Option<Value>,
}

#[derive(Deserialize)]
struct CheckUserResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: Option<String>,
}

/// Username rule for every signup path: lowercase letters and digits only.
pub fn username_is_valid(username: &str) -> bool {
    static USERNAME: OnceLock<Option<Regex>> = OnceLock::new();
    USERNAME
        .get_or_init(|| Regex::new(r"^[a-z0-9]+$").ok())
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(username))
}

/// Password strength rule. The two signup paths enforce different ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordPolicy {
    /// At least eight of letters, digits and `!@#$%^&*`, with a letter, a
    /// digit and a special among them.
    Signup,
    /// At least eight of letters, digits and `@$!%*?&`, with a lowercase,
    /// an uppercase, a digit and a special among them.
    GoogleSignup,
}

impl PasswordPolicy {
    /// The first pattern bounds the alphabet and length; every other one
    /// must find at least one character.
    fn patterns(self) -> &'static [&'static str] {
        match self {
            PasswordPolicy::Signup => &[
                r"^[A-Za-z0-9!@#$%^&*]{8,}$",
                r"[A-Za-z]",
                r"[0-9]",
                r"[!@#$%^&*]",
            ],
            PasswordPolicy::GoogleSignup => &[
                r"^[A-Za-z0-9@$!%*?&]{8,}$",
                r"[a-z]",
                r"[A-Z]",
                r"[0-9]",
                r"[@$!%*?&]",
            ],
        }
    }

    fn rules(self) -> Option<&'static RegexSet> {
        static SIGNUP: OnceLock<Option<RegexSet>> = OnceLock::new();
        static GOOGLE_SIGNUP: OnceLock<Option<RegexSet>> = OnceLock::new();
        let slot = match self {
            PasswordPolicy::Signup => &SIGNUP,
            PasswordPolicy::GoogleSignup => &GOOGLE_SIGNUP,
        };
        slot.get_or_init(|| RegexSet::new(self.patterns()).ok())
            .as_ref()
    }

    pub fn accepts(self, password: &str) -> bool {
        self.rules()
            .is_some_and(|rules| rules.matches(password).matched_all())
    }

    fn message(self) -> &'static str {
        match self {
            PasswordPolicy::Signup => {
                "Password must be at least 8 characters, including a number and a special character."
            }
            PasswordPolicy::GoogleSignup => {
                "Password must be at least 8 characters long, include a number, an uppercase letter, and a special character."
            }
        }
    }
}

fn validate_username(username: &str) -> Result<(), AnalysisError> {
    if !username_is_valid(username) {
        return Err(AnalysisError::validation(
            "Username cannot contain uppercase letters or whitespace.",
        ));
    }
    Ok(())
}

fn validate_password(password: &str, policy: PasswordPolicy) -> Result<(), AnalysisError> {
    if !policy.accepts(password) {
        return Err(AnalysisError::validation(policy.message()));
    }
    Ok(())
}

fn storage_error(err: anyhow::Error) -> AnalysisError {
    AnalysisError::Io(format!("{err:#}"))
}

/// Login, signup and password recovery. Successful sign-ins hand the token
/// to the session.
pub struct AuthFlows {
    api: ApiClient,
    login: FormSlot,
    signup: FormSlot,
    google: FormSlot,
    password: FormSlot,
}

impl AuthFlows {
    pub fn new(api: ApiClient) -> Self {
        Self {
            login: FormSlot::new("login", api.events_handle()),
            signup: FormSlot::new("signup", api.events_handle()),
            google: FormSlot::new("google", api.events_handle()),
            password: FormSlot::new("password", api.events_handle()),
            api,
        }
    }

    /// `credential` is either the username or the email.
    pub async fn login(&self, credential: &str, password: &str) -> Result<(), AnalysisError> {
        self.login
            .submit(&LOGIN_NOTICES, async {
                if credential.trim().is_empty() || password.is_empty() {
                    return Err(AnalysisError::validation("All fields are required."));
                }
                let response: TokenResponse = self
                    .api
                    .post_json(&LOGIN, &Credentials {
                        credential: credential.trim(),
                        password,
                    })
                    .await?;
                self.start_session(response)
            })
            .await?;

        self.signed_in("Login successful! Redirecting to profile...");
        Ok(())
    }

    pub async fn register(&self, form: &SignupForm) -> Result<(), AnalysisError> {
        self.signup
            .submit(&REGISTER_NOTICES, async {
                if form.username.is_empty() || form.email.trim().is_empty() || form.password.is_empty() {
                    return Err(AnalysisError::validation("All fields are required."));
                }
                validate_username(&form.username)?;
                validate_password(&form.password, PasswordPolicy::Signup)?;
                if form.password != form.confirm_password {
                    return Err(AnalysisError::validation("Passwords do not match."));
                }

                self.check_user(json!({ "username": form.username, "email": form.email }))
                    .await?;

                self.api
                    .post_bytes(
                        &REGISTER,
                        &json!({
                            "username": form.username,
                            "email": form.email,
                            "password": form.password,
                        }),
                    )
                    .await?;

                // Prefills the login form; the password is not kept.
                self.api
                    .session()
                    .save_user(json!({ "username": form.username, "email": form.email }))
                    .map_err(storage_error)
            })
            .await?;

        let sink = self.api.events();
        events::toast(sink, "Sign up successful! Please log in.", ToastKind::Success);
        events::navigate(sink, LOGIN_ROUTE);
        Ok(())
    }

    /// Exchanges a Google access token for a session. An unknown Google
    /// user is routed to the signup form instead of failing.
    pub async fn google_login(&self, access_token: &str) -> Result<GoogleLoginOutcome, AnalysisError> {
        let result = self
            .google
            .submit(&GOOGLE_LOGIN_NOTICES, async {
                let response: TokenResponse = self
                    .api
                    .post_json(&GOOGLE_LOGIN, &json!({ "token": access_token }))
                    .await?;
                self.start_session(response)
            })
            .await;

        match result {
            Ok(()) => {
                self.signed_in("Redirecting to profile...");
                Ok(GoogleLoginOutcome::SignedIn)
            }
            Err(AnalysisError::Unauthorized) => {
                events::navigate(self.api.events(), GOOGLE_SIGNUP_ROUTE);
                Ok(GoogleLoginOutcome::SignupRequired)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn google_signup(
        &self,
        access_token: &str,
        email: Option<&str>,
        username: &str,
        password: &str,
    ) -> Result<(), AnalysisError> {
        self.google
            .submit(&GOOGLE_SIGNUP_NOTICES, async {
                if username.is_empty() || password.is_empty() {
                    return Err(AnalysisError::validation("Username and password are required."));
                }
                validate_username(username)?;
                validate_password(password, PasswordPolicy::GoogleSignup)?;

                self.check_user(json!({
                    "token": access_token,
                    "email": email.unwrap_or_default(),
                    "username": username,
                }))
                .await?;

                let response: TokenResponse = self
                    .api
                    .post_json(
                        &GOOGLE_SIGNUP,
                        &json!({
                            "token": access_token,
                            "username": username,
                            "password": password,
                        }),
                    )
                    .await?;
                self.start_session(response)
            })
            .await?;

        self.signed_in("Signup successful! You are now logged in.");
        Ok(())
    }

    pub async fn forgot_password(&self, email: &str) -> Result<(), AnalysisError> {
        let message = self
            .password
            .submit(&FORGOT_NOTICES, async {
                if email.trim().is_empty() {
                    return Err(AnalysisError::validation("Please enter your email."));
                }
                let response: MessageResponse = self
                    .api
                    .post_json(&FORGOT_PASSWORD, &json!({ "email": email.trim() }))
                    .await?;
                Ok(response.message)
            })
            .await?;

        let sink = self.api.events();
        events::toast(
            sink,
            message.unwrap_or_else(|| "Password reset link sent.".to_string()),
            ToastKind::Success,
        );
        events::navigate(sink, LOGIN_ROUTE);
        Ok(())
    }

    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<(), AnalysisError> {
        self.password
            .submit(&RESET_NOTICES, async {
                if new_password != confirm_password {
                    return Err(AnalysisError::validation("Passwords do not match."));
                }
                if new_password.is_empty() {
                    return Err(AnalysisError::validation("Please enter a new password."));
                }
                self.api
                    .post_bytes(
                        &RESET_PASSWORD,
                        &json!({ "token": token, "new_password": new_password }),
                    )
                    .await?;
                Ok(())
            })
            .await?;

        let sink = self.api.events();
        events::toast(
            sink,
            "Password reset successful! Redirecting to login...",
            ToastKind::Success,
        );
        events::navigate(sink, LOGIN_ROUTE);
        Ok(())
    }

    /// Fails with the backend's reason when the username or email is taken.
    async fn check_user(&self, body: Value) -> Result<(), AnalysisError> {
        let response: CheckUserResponse = self.api.post_json(&CHECK_USER, &body).await?;
        if let Some(error) = response.error {
            return Err(AnalysisError::Validation(error));
        }
        match response.message.as_deref() {
            Some(USERS_AVAILABLE) | None => Ok(()),
            Some(other) => Err(AnalysisError::Validation(other.to_string())),
        }
    }

    fn start_session(&self, response: TokenResponse) -> Result<(), AnalysisError> {
        let session = self.api.session();
        session.login(response.access_token).map_err(storage_error)?;
        if let Some(user) = response.user {
            session.save_user(user).map_err(storage_error)?;
        }
        Ok(())
    }

    fn signed_in(&self, message: &str) {
        let sink = self.api.events();
        events::toast(sink, message, ToastKind::Success);
        events::navigate(sink, PROFILE_ROUTE);
    }
}
