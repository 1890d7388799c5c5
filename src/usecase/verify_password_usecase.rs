use crate::{
    domain::{
        error::DomainError,
        models::credential::{HashedPassword, PlainPassword},
        services::password_service::PasswordHasher,
    },
    infrastructure::hashing_pool::HashingPool,
};

pub struct VerifyPasswordUsecase<P: PasswordHasher> {
    password_hasher: P,
    pool: HashingPool,
    max_password_bytes: usize,
}

impl<P: PasswordHasher> VerifyPasswordUsecase<P> {
    pub fn new(password_hasher: P, pool: HashingPool, max_password_bytes: usize) -> Self {
        Self {
            password_hasher,
            pool,
            max_password_bytes,
        }
    }

    /// `Ok(false)` covers both a wrong password and an unusable hash
    pub async fn verify(&self, password: String, hash: String) -> Result<bool, DomainError>
    where
        P: Send + Sync + 'static,
    {
        let password = PlainPassword::new(password, self.max_password_bytes)?;
        let hash = HashedPassword::parse(hash)?;

        let password_hasher = self.password_hasher.clone();
        self.pool
            .run(move || password_hasher.verify(&password, &hash))
            .await
    }
}
