//! Plain-text bodies for every message the service sends.

use super::OutgoingMail;

pub fn email_verification(to: &str, name: &str, link: &str, ttl_minutes: i64) -> OutgoingMail {
    let body = format!(
        "Hello {name},\n\
        \n\
        Thank you for registering. Please confirm your email address by opening\n\
        the link below:\n\
        \n\
        {link}\n\
        \n\
        This link will expire in {ttl_minutes} minutes.\n\
        \n\
        If you did not create an account, no further action is required.\n",
    );

    OutgoingMail {
        to: to.to_string(),
        subject: "Verify Email Address".to_string(),
        body,
    }
}

pub fn password_reset_otp(to: &str, otp: &str, ttl_minutes: i64) -> OutgoingMail {
    let body = format!(
        "Hello,\n\
        \n\
        We received a request to reset the password for your account.\n\
        Your one-time code is:\n\
        \n\
        {otp}\n\
        \n\
        This code will expire in {ttl_minutes} minutes and can be used once.\n\
        \n\
        If you did not request a password reset, you can ignore this email.\n",
    );

    OutgoingMail {
        to: to.to_string(),
        subject: "Password Reset OTP Code".to_string(),
        body,
    }
}

pub fn password_changed(to: &str, name: &str) -> OutgoingMail {
    let body = format!(
        "Hello {name},\n\
        \n\
        The password for your account was just reset and every active session\n\
        was signed out.\n\
        \n\
        If this was not you, request a new password reset immediately.\n",
    );

    OutgoingMail {
        to: to.to_string(),
        subject: "Your Password Has Been Reset".to_string(),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_mail_carries_code_and_expiry() {
        let mail = password_reset_otp("budi@polban.ac.id", "4821", 15);
        assert_eq!(mail.to, "budi@polban.ac.id");
        assert!(mail.body.contains("4821"));
        assert!(mail.body.contains("15 minutes"));
    }

    #[test]
    fn verification_mail_carries_link() {
        let mail = email_verification(
            "budi@polban.ac.id",
            "Budi",
            "http://localhost:8080/api/email/verify?token=abc",
            60,
        );
        assert!(mail.body.starts_with("Hello Budi,"));
        assert!(mail.body.contains("token=abc"));
    }
}
