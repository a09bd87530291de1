use crate::session::DocumentKind;
use crate::settings::Price;

pub const WELCOME: &str = "Hello! I'm a bot that helps with car insurance.\n\
I'll help you get insurance.\n\
Please, submit a photo of your passport and vehicle identification document.";

pub const SELECT_DOCUMENT_FIRST: &str = "Please, select a document using the buttons first.";

pub const DATA_REJECTED: &str = "Sorry for my mistake. Please, retake and resubmit photos.";

pub const POLICY_CAPTION: &str =
    "Here is your insurance policy document. Thank you for your purchase!";

pub const ISSUANCE_FAILED: &str = "Sorry, I couldn't prepare your policy document right now. \
Press Yes again to retry.";

pub const EXTRACTION_PLACEHOLDER: &str = "Failed to read document text.";

pub const MISSING_DOCUMENTS: &str = "Both documents must be uploaded.";

pub fn waiting_for(kind: DocumentKind) -> String {
    format!("I'm waiting for a photo of your {}.", kind.label())
}

pub fn received(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Passport => "Passport received.",
        DocumentKind::VehicleDocument => "Vehicle document received.",
    }
}

pub fn resend(kind: DocumentKind) -> String {
    format!("Please send a photo of your {}.", kind.label())
}

pub fn confirm_data(extracted: &str) -> String {
    format!(
        "Thank you! Both documents received. I found the following data:\n\n{}\n\n\
        Is everything correct?",
        extracted
    )
}

pub fn price_offer(price: &Price) -> String {
    format!(
        "Well, now I want to inform you that the fixed price for the insurance is {}.\n\
        Do you agree with this price?",
        price
    )
}

pub fn price_declined(price: &Price) -> String {
    format!(
        "I apologize, but {} is the only available price. Do you want to continue?",
        price
    )
}

pub fn extracted_data(passport: &str, vehicle: &str) -> String {
    format!("Passport Info:\n{}\n\nVehicle Info:\n{}", passport, vehicle)
}

pub fn policy_instruction(extracted: &str) -> String {
    format!(
        "Generate a formatted dummy insurance policy document based on:\n\n{}",
        extracted
    )
}

pub fn generation_error(error: &impl std::fmt::Display) -> String {
    format!("Generation error: {}", error)
}
