use super::*;
use crate::{address::Address, constants::MAX_SEATS};
use bytes::BufMut;

fn addr(byte: u8) -> Address {
    Address::new([byte; 32])
}

fn sample_table() -> TableVault {
    let mut players = [None; MAX_SEATS];
    players[0] = Some(addr(1));
    players[3] = Some(addr(2));
    TableVault {
        table_id: 4,
        owner: addr(9),
        template_name: "challenger".to_string(),
        max_players: 7,
        min_buy_in: 100_000_000,
        max_buy_in: 1_000_000_000,
        creation_fee: 10_000_000,
        start_fee: 1_000_000,
        players,
        bump: 255,
    }
}

#[test]
fn test_player_vault_layout() {
    let mut data = RecordKind::PlayerVault.discriminator().to_vec();
    data.extend_from_slice(&[5u8; 32]);
    data.put_u8(1); // seated
    data.put_u8(0); // ready
    data.put_u8(1); // table id present
    data.put_u64_le(3);
    data.put_u64_le(250_000_000);
    data.put_u8(254);
    // Allocation padding.
    data.extend_from_slice(&[0u8; 16]);

    let vault: PlayerVault = decode_record(&data).unwrap();
    assert_eq!(vault.owner, addr(5));
    assert!(vault.is_seated);
    assert!(!vault.is_ready);
    assert_eq!(vault.current_table_id, Some(3));
    assert_eq!(vault.buy_in_amount, 250_000_000);
    assert_eq!(vault.bump, 254);
    assert!(vault.is_seated_at(3));
    assert!(!vault.is_seated_at(4));
    assert_eq!(vault.available_balance(300_000_000), 50_000_000);
    assert_eq!(vault.available_balance(1), 0);
}

#[test]
fn test_table_vault_encoding() {
    let table = sample_table();
    let encoded = encode_record(&table);
    assert_eq!(&encoded[..8], &RecordKind::TableVault.discriminator());
    // Two occupied seats at 33 bytes, five empty at 1 byte.
    let seats = 2 * 33 + 5;
    assert_eq!(encoded.len(), 8 + 8 + 32 + 4 + 10 + 1 + 32 + seats + 1);
    assert_eq!(&encoded[8..16], &4u64.to_le_bytes());

    let decoded: TableVault = decode_record(&encoded).unwrap();
    assert_eq!(decoded, table);
    assert_eq!(decoded.occupied(), 2);
    assert_eq!(decoded.seat_of(&addr(2)), Some(3));
    assert_eq!(decoded.seat_of(&addr(3)), None);
    assert!(!decoded.is_full());
    assert!(!decoded.is_empty());
    assert_eq!(
        decoded.occupants().collect::<Vec<_>>(),
        vec![(0, addr(1)), (3, addr(2))]
    );
}

#[test]
fn test_table_full_respects_max_players() {
    let mut table = sample_table();
    table.max_players = 2;
    assert!(table.is_full());
    table.max_players = 200;
    assert_eq!(table.capacity(), MAX_SEATS);
    table.players = [Some(addr(1)); MAX_SEATS];
    assert!(table.is_full());
}

#[test]
fn test_dealer_balance_checks() {
    let mut dealer = Dealer {
        table_id: 4,
        authority: addr(9),
        total_tokens_issued: 3_000,
        ..Default::default()
    };
    dealer.players_tokens[0] = TokenEntry {
        player_vault: Some(addr(1)),
        tokens: 1_000,
    };
    dealer.players_tokens[2] = TokenEntry {
        player_vault: Some(addr(2)),
        tokens: 2_000,
    };
    assert!(dealer.is_balanced());
    assert_eq!(dealer.tokens_of(&addr(2)), Some(2_000));
    assert_eq!(dealer.tokens_of(&addr(3)), None);
    assert_eq!(dealer.entries().count(), 2);

    let decoded: Dealer = decode_record(&encode_record(&dealer)).unwrap();
    assert_eq!(decoded, dealer);

    dealer.players_tokens[2].tokens = u64::MAX;
    assert!(!dealer.is_balanced());
}

#[test]
fn test_small_records() {
    let treasury = Treasury {
        authority: addr(7),
        total_collected: 42,
        bump: 253,
    };
    let encoded = encode_record(&treasury);
    assert_eq!(encoded.len(), 8 + 32 + 8 + 1);
    assert_eq!(decode_record::<Treasury>(&encoded).unwrap(), treasury);

    let counter = TableCounter { count: 12, bump: 255 };
    assert_eq!(
        decode_record::<TableCounter>(&encode_record(&counter)).unwrap(),
        counter
    );

    let template = Template {
        name: "challenger".to_string(),
        min_buy_in: 100_000_000,
        max_buy_in: 1_000_000_000,
        max_players: 7,
        bump: 255,
    };
    assert_eq!(
        decode_record::<Template>(&encode_record(&template)).unwrap(),
        template
    );
}

#[test]
fn test_discriminator_mismatch() {
    let counter = TableCounter { count: 1, bump: 1 };
    let mut encoded = encode_record(&counter);
    let err = decode_record::<Treasury>(&encoded).unwrap_err();
    assert!(matches!(
        err,
        RecordError::DiscriminatorMismatch {
            kind: RecordKind::Treasury,
            ..
        }
    ));

    encoded[0] ^= 0xff;
    assert!(matches!(
        decode_record::<TableCounter>(&encoded),
        Err(RecordError::DiscriminatorMismatch { .. })
    ));
}

#[test]
fn test_truncated_records() {
    assert!(matches!(
        decode_record::<TableCounter>(&[1, 2, 3]),
        Err(RecordError::TooShort { len: 3, .. })
    ));
    let encoded = encode_record(&sample_table());
    assert!(matches!(
        decode_record::<TableVault>(&encoded[..encoded.len() - 1]),
        Err(RecordError::Codec { .. })
    ));
}
