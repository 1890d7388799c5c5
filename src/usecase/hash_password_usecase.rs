use crate::{
    domain::{
        error::DomainError,
        models::credential::{HashedPassword, PlainPassword},
        services::password_service::PasswordHasher,
    },
    infrastructure::hashing_pool::HashingPool,
};

pub struct HashPasswordUsecase<P: PasswordHasher> {
    password_hasher: P,
    pool: HashingPool,
    max_password_bytes: usize,
}

impl<P: PasswordHasher> HashPasswordUsecase<P> {
    pub fn new(password_hasher: P, pool: HashingPool, max_password_bytes: usize) -> Self {
        Self {
            password_hasher,
            pool,
            max_password_bytes,
        }
    }

    pub async fn hash(&self, password: String) -> Result<HashedPassword, DomainError>
    where
        P: Send + Sync + 'static,
    {
        // Validate before taking a pool slot
        let password = PlainPassword::new(password, self.max_password_bytes)?;

        let password_hasher = self.password_hasher.clone();
        self.pool
            .run(move || password_hasher.hash(&password))
            .await
    }
}
