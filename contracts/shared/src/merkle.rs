use soroban_sdk::{xdr::ToXdr, Address, Bytes, BytesN, Env, Vec};

/// Leaf of the v1 yield tree:
/// `keccak256(index_be_u64 || account_xdr || weight_be_i128 || pending_be_i128)`.
pub fn leaf(
    env: &Env,
    index: u64,
    account: &Address,
    weight: i128,
    pending_v1_rewards: i128,
) -> BytesN<32> {
    let mut data = Bytes::new(env);
    data.extend_from_array(&index.to_be_bytes());
    data.append(&account.clone().to_xdr(env));
    data.extend_from_array(&weight.to_be_bytes());
    data.extend_from_array(&pending_v1_rewards.to_be_bytes());
    env.crypto().keccak256(&data).into()
}

/// Commutative node hash: the smaller child always goes first.
pub fn hash_pair(env: &Env, a: &BytesN<32>, b: &BytesN<32>) -> BytesN<32> {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    let mut data = Bytes::new(env);
    data.append(&Bytes::from(first.clone()));
    data.append(&Bytes::from(second.clone()));
    env.crypto().keccak256(&data).into()
}

pub fn verify(env: &Env, proof: &Vec<BytesN<32>>, root: &BytesN<32>, leaf: BytesN<32>) -> bool {
    let mut computed = leaf;
    for node in proof.iter() {
        computed = hash_pair(env, &computed, &node);
    }
    computed == *root
}

#[cfg(test)]
mod tests {
    use super::*;
    use soroban_sdk::{testutils::Address as _, vec};

    #[test]
    fn three_leaf_tree_verifies_each_member() {
        let env = Env::default();
        let alice = Address::generate(&env);
        let bob = Address::generate(&env);
        let carol = Address::generate(&env);

        let l0 = leaf(&env, 0, &alice, 2_000, 0);
        let l1 = leaf(&env, 1, &bob, 10_000, 0);
        let l2 = leaf(&env, 2, &carol, 4_000, 0);
        let n01 = hash_pair(&env, &l0, &l1);
        let root = hash_pair(&env, &n01, &l2);

        assert!(verify(&env, &vec![&env, l1.clone(), l2.clone()], &root, l0.clone()));
        assert!(verify(&env, &vec![&env, l0.clone(), l2.clone()], &root, l1.clone()));
        assert!(verify(&env, &vec![&env, n01], &root, l2.clone()));

        // bob cannot reuse alice's proof
        let forged = leaf(&env, 0, &bob, 2_000, 0);
        assert!(!verify(&env, &vec![&env, l1, l2], &root, forged));
    }

    #[test]
    fn pair_hash_is_commutative() {
        let env = Env::default();
        let a = BytesN::from_array(&env, &[1u8; 32]);
        let b = BytesN::from_array(&env, &[2u8; 32]);
        assert_eq!(hash_pair(&env, &a, &b), hash_pair(&env, &b, &a));
    }
}
