pub mod hash_password_usecase;
pub mod verify_password_usecase;
