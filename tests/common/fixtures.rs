//! Raw RFC 5322 messages for integration tests

/// Plain single-part message
pub fn plain_email(from: &str, subject: &str, date: &str, body: &str) -> Vec<u8> {
    format!(
        "From: {from}\r\n\
         To: archive@example.com\r\n\
         Subject: {subject}\r\n\
         Date: {date}\r\n\
         Message-ID: <{subject}@example.com>\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         \r\n\
         {body}\r\n"
    )
    .into_bytes()
}

/// Multipart message with text, HTML and one base64 attachment
pub fn email_with_attachment(from: &str, date: &str, filename: &str) -> Vec<u8> {
    format!(
        "From: {from}\r\n\
         Subject: Quarterly report\r\n\
         Date: {date}\r\n\
         MIME-Version: 1.0\r\n\
         Content-Type: multipart/mixed; boundary=\"outer\"\r\n\
         \r\n\
         --outer\r\n\
         Content-Type: multipart/alternative; boundary=\"inner\"\r\n\
         \r\n\
         --inner\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         \r\n\
         See attached.\r\n\
         --inner\r\n\
         Content-Type: text/html; charset=utf-8\r\n\
         \r\n\
         <p>See attached.</p>\r\n\
         --inner--\r\n\
         --outer\r\n\
         Content-Type: application/pdf; name=\"{filename}\"\r\n\
         Content-Disposition: attachment; filename=\"{filename}\"\r\n\
         Content-Transfer-Encoding: base64\r\n\
         \r\n\
         JVBERi0xLjQKJcfsj6IK\r\n\
         --outer--\r\n"
    )
    .into_bytes()
}

/// March 2024 message dates, first and last day included
pub const MARCH_DATES: [&str; 3] = [
    "Fri, 01 Mar 2024 08:15:00 +0000",
    "Fri, 15 Mar 2024 12:00:00 +0000",
    "Sun, 31 Mar 2024 23:00:00 +0000",
];

/// April 2024 message dates
pub const APRIL_DATES: [&str; 2] = [
    "Mon, 01 Apr 2024 09:30:00 +0000",
    "Tue, 30 Apr 2024 18:45:00 +0000",
];
